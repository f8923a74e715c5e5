use crate::{P95, P99};
use std::time::Duration;

/// Completion counters. `total == success + failed` at every observation point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
}

impl Counters {
    /// Fraction of completed requests that succeeded, `0.` when nothing completed.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.
        } else {
            self.success as f64 / self.total as f64
        }
    }

    /// Completed requests per second over `elapsed`, `0.` for an empty window.
    pub fn rps(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0. {
            self.total as f64 / secs
        } else {
            0.
        }
    }
}

/// Consistent, independently-owned copy of the aggregator state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub counters: Counters,
    /// Latencies in arrival order.
    pub latencies: Vec<Duration>,
}

/// Latency summary in milliseconds. Every value is derived from whole-millisecond samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatencyStats {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl LatencyStats {
    /// Sorts `sample` in place. Returns all zeros for an empty sample.
    pub fn from_sample(sample: &mut [Duration]) -> Self {
        if sample.is_empty() {
            return Self::default();
        }
        sample.sort_unstable();

        let sum: f64 = sample.iter().copied().map(whole_ms).sum();
        Self {
            avg_ms: sum / sample.len() as f64,
            min_ms: whole_ms(sample[0]),
            max_ms: whole_ms(sample[sample.len() - 1]),
            p95_ms: whole_ms(percentile(sample, P95)),
            p99_ms: whole_ms(percentile(sample, P99)),
        }
    }
}

/// Nearest-rank percentile of an ascending, non-empty sample: `sorted[floor(n * fraction)]`,
/// clamped to the last element.
pub fn percentile(sorted: &[Duration], fraction: f64) -> Duration {
    let n = sorted.len();
    let idx = ((n as f64 * fraction) as usize).min(n.saturating_sub(1));
    sorted[idx]
}

fn whole_ms(d: Duration) -> f64 {
    d.as_millis() as f64
}

/// Aggregate statistics for a finished run.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalReport {
    pub counters: Counters,
    pub success_rate: f64,
    pub latency: LatencyStats,
    /// Completed requests per second of wall-clock run time.
    pub rps: f64,
    /// From the start signal to the moment every worker had joined.
    pub duration: Duration,
}

impl FinalReport {
    /// Consumes the final snapshot of a run that lasted `duration`.
    pub fn compute(snapshot: Snapshot, duration: Duration) -> Self {
        let Snapshot {
            counters,
            mut latencies,
        } = snapshot;

        let latency = if counters.total > 0 {
            LatencyStats::from_sample(&mut latencies)
        } else {
            LatencyStats::default()
        };

        Self {
            counters,
            success_rate: counters.success_rate(),
            latency,
            rps: counters.rps(duration),
            duration,
        }
    }

    /// Share of completed requests that failed, as a fraction.
    pub fn failure_rate(&self) -> f64 {
        if self.counters.total == 0 {
            0.
        } else {
            self.counters.failed as f64 / self.counters.total as f64
        }
    }
}
