use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use volley_core::StopCondition;

/// Derives the single stop signal of a run from its [`StopCondition`].
///
/// With a duration the timer is the automatic trigger. Without one the run only ends when a
/// worker exhausts the request budget and cancels the stop token. Either way the
/// budget is enforced by the workers.
pub(crate) struct StopController {
    condition: StopCondition,
    handle: StopHandle,
}

impl StopController {
    pub fn new(condition: StopCondition, handle: StopHandle) -> Self {
        Self { condition, handle }
    }

    pub fn stop_token(&self) -> &CancellationToken {
        &self.handle.stop
    }

    pub fn abort_token(&self) -> &CancellationToken {
        &self.handle.abort
    }

    /// Resolves once the run must stop. `started` is the instant of the start broadcast.
    pub async fn wait(&self, started: Instant) {
        match self.condition.duration() {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(started + duration) => {
                        debug!("Run duration of {duration:?} elapsed.");
                    }
                    _ = self.handle.stop.cancelled() => {}
                }
                self.handle.stop();
            }
            None => self.handle.stop.cancelled().await,
        }
    }
}

/// Cloneable control over a run from the outside.
///
/// `stop` lets in-flight requests finish; `abort` also cancels them.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    stop: CancellationToken,
    abort: CancellationToken,
}

impl StopHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// No further requests are dispatched. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Stops the run and cancels requests that are still in flight. Idempotent.
    pub fn abort(&self) {
        info!("Aborting in-flight requests.");
        self.abort.cancel();
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}
