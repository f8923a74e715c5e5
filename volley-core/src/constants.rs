use std::time::Duration;

/// HTTP method used when none is supplied.
pub const DEFAULT_METHOD: &str = "GET";

/// Number of workers used by the CLI when `--concurrency` is not given.
pub const DEFAULT_CONCURRENCY: i64 = 10;

/// Run length used by the CLI when `--duration` is not given.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(30 * 60);

/// Per-request timeout used by the CLI when `--timeout` is not given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Cadence of the live progress line.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

pub const P95: f64 = 0.95;
pub const P99: f64 = 0.99;
