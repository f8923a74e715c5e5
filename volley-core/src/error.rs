use thiserror::Error;

/// Inconsistent run input, detected before any resource is allocated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("URL is required")]
    EmptyUrl,

    #[error("rate must be >= 0")]
    NegativeRate,

    #[error("rate must be <= {}", u32::MAX)]
    RateTooHigh,

    #[error("concurrency must be > 0")]
    NonPositiveConcurrency,

    #[error("either duration or total must be > 0")]
    NoStopCondition,

    #[error("timeout must be > 0")]
    NonPositiveTimeout,

    #[error("invalid header format: {0:?} (expected 'Key: Value')")]
    MalformedHeader(String),

    #[error("empty header key in: {0:?}")]
    EmptyHeaderKey(String),
}
