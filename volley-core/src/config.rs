use crate::{ConfigError, DEFAULT_CONCURRENCY, DEFAULT_METHOD, DEFAULT_TIMEOUT};
use std::collections::HashMap;
use std::fmt;
use std::num::{NonZeroU32, NonZeroU64, NonZeroUsize};
use std::time::Duration;

/// Raw run input as handed over by a front-end such as the CLI.
///
/// Nothing here is trusted; [`RunSettings::validate`] turns it into a [`RunConfig`].
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub url: String,
    pub method: String,
    /// `"Key: Value"` entries, in the order given.
    pub headers: Vec<String>,
    pub body: Vec<u8>,
    /// Requests per second, `0` for unlimited.
    pub rate: i64,
    pub concurrency: i64,
    /// `Duration::ZERO` disables the timer.
    pub duration: Duration,
    /// `0` disables the request budget.
    pub total: i64,
    pub timeout: Duration,
    pub quiet: bool,
    pub keep_alive: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: DEFAULT_METHOD.to_string(),
            headers: vec![],
            body: vec![],
            rate: 0,
            concurrency: DEFAULT_CONCURRENCY,
            duration: Duration::ZERO,
            total: 0,
            timeout: DEFAULT_TIMEOUT,
            quiet: false,
            keep_alive: true,
        }
    }
}

impl RunSettings {
    pub fn validate(self) -> Result<RunConfig, ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::EmptyUrl);
        }

        if self.rate < 0 {
            return Err(ConfigError::NegativeRate);
        }
        let rate = u32::try_from(self.rate)
            .map(NonZeroU32::new)
            .map_err(|_| ConfigError::RateTooHigh)?;

        let concurrency = usize::try_from(self.concurrency)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or(ConfigError::NonPositiveConcurrency)?;

        let budget = u64::try_from(self.total).ok().and_then(NonZeroU64::new);
        let duration = Some(self.duration).filter(|d| !d.is_zero());
        let stop = StopCondition::new(duration, budget).ok_or(ConfigError::NoStopCondition)?;

        if self.timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout);
        }

        let headers = parse_headers(&self.headers)?;

        let method = if self.method.is_empty() {
            DEFAULT_METHOD.to_string()
        } else {
            self.method.to_uppercase()
        };

        Ok(RunConfig {
            url: self.url,
            method,
            headers,
            raw_headers: self.headers,
            body: self.body,
            timeout: self.timeout,
            concurrency,
            rate,
            stop,
            quiet: self.quiet,
            keep_alive: self.keep_alive,
        })
    }
}

/// Split `"Key: Value"` entries into a map. Duplicate keys collapse, last one wins.
pub fn parse_headers<S: AsRef<str>>(entries: &[S]) -> Result<HashMap<String, String>, ConfigError> {
    let mut headers = HashMap::with_capacity(entries.len());
    for entry in entries {
        let entry = entry.as_ref();
        let (key, value) = entry
            .split_once(':')
            .ok_or_else(|| ConfigError::MalformedHeader(entry.to_string()))?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::EmptyHeaderKey(entry.to_string()));
        }
        headers.insert(key.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

/// Validated, immutable description of one run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    url: String,
    method: String,
    headers: HashMap<String, String>,
    raw_headers: Vec<String>,
    body: Vec<u8>,
    timeout: Duration,
    concurrency: NonZeroUsize,
    rate: Option<NonZeroU32>,
    stop: StopCondition,
    quiet: bool,
    keep_alive: bool,
}

impl RunConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Headers exactly as they were supplied, for display.
    pub fn raw_headers(&self) -> &[String] {
        &self.raw_headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn concurrency(&self) -> NonZeroUsize {
        self.concurrency
    }

    /// `None` means unlimited.
    pub fn rate(&self) -> Option<NonZeroU32> {
        self.rate
    }

    pub fn stop(&self) -> StopCondition {
        self.stop
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

/// When a run ends.
///
/// A positive duration is the automatic trigger whenever present. A positive budget caps the
/// number of dispatched requests regardless, and is the only trigger when there is no duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopCondition {
    duration: Option<Duration>,
    budget: Option<NonZeroU64>,
}

impl StopCondition {
    /// Returns `None` unless at least one of the two limits is set.
    pub fn new(duration: Option<Duration>, budget: Option<NonZeroU64>) -> Option<Self> {
        let duration = duration.filter(|d| !d.is_zero());
        if duration.is_none() && budget.is_none() {
            return None;
        }
        Some(Self { duration, budget })
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn budget(&self) -> Option<NonZeroU64> {
        self.budget
    }
}

impl fmt::Display for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.duration, self.budget) {
            (Some(d), Some(n)) => write!(
                f,
                "after {} or {n} requests",
                humantime::format_duration(d)
            ),
            (Some(d), None) => write!(f, "after {}", humantime::format_duration(d)),
            (None, Some(n)) => write!(f, "after {n} requests"),
            (None, None) => write!(f, "never"),
        }
    }
}
