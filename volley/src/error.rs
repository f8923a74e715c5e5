use std::sync::PoisonError;
use thiserror::Error;
use volley_core::ConfigError;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("Aggregator mutex is poisoned.")]
    PoisonData,

    #[error("Run task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl<T> From<PoisonError<T>> for RunError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}
