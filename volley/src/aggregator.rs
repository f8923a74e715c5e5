use crate::error::RunError;
use std::num::NonZeroU64;
use std::sync::Mutex;
use std::time::Duration;
use volley_core::{Counters, Outcome, Snapshot};

#[derive(Default)]
struct State {
    counters: Counters,
    latencies: Vec<Duration>,
    /// Dispatch attempts so far. Only used to enforce the request budget.
    sent: u64,
}

/// Run state written by every worker and read by the progress reporter.
///
/// Counters, latencies and the dispatch count sit behind one lock, so every snapshot is
/// internally consistent.
#[derive(Default)]
pub(crate) struct SharedAggregator {
    state: Mutex<State>,
}

impl SharedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims one dispatch. `false` once `budget` requests have been claimed.
    pub fn reserve(&self, budget: Option<NonZeroU64>) -> Result<bool, RunError> {
        let mut state = self.state.lock()?;
        if let Some(budget) = budget {
            if state.sent >= budget.get() {
                return Ok(false);
            }
        }
        state.sent += 1;
        Ok(true)
    }

    pub fn record(&self, outcome: &Outcome) -> Result<(), RunError> {
        {
            let mut state = self.state.lock()?;
            state.counters.total += 1;
            if outcome.success {
                state.counters.success += 1;
            } else {
                state.counters.failed += 1;
            }
            state.latencies.push(outcome.latency);
        }

        #[cfg(feature = "metrics")]
        {
            metrics::histogram!("volley_request_latency").record(outcome.latency.as_secs_f64());
            if outcome.success {
                metrics::counter!("volley_requests_success").increment(1);
            } else {
                metrics::counter!("volley_requests_error").increment(1);
            }
        }

        Ok(())
    }

    /// Owned copy of counters and latencies, safe to sort without holding the lock.
    pub fn snapshot(&self) -> Result<Snapshot, RunError> {
        let state = self.state.lock()?;
        Ok(Snapshot {
            counters: state.counters,
            latencies: state.latencies.clone(),
        })
    }

    pub fn sent(&self) -> Result<u64, RunError> {
        Ok(self.state.lock()?.sent)
    }
}
