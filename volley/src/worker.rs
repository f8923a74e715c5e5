use crate::aggregator::SharedAggregator;
use crate::barrier::StartBarrier;
use crate::error::RunError;
use crate::limiter::RateLimiter;
use crate::target::RequestTarget;
use std::num::NonZeroU64;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, trace, warn, Instrument};

/// Everything a dispatch loop shares with its siblings.
pub(crate) struct WorkerContext<T> {
    pub target: Arc<T>,
    pub aggregator: Arc<SharedAggregator>,
    pub barrier: Arc<StartBarrier>,
    pub limiter: RateLimiter,
    pub stop: CancellationToken,
    pub abort: CancellationToken,
    pub budget: Option<NonZeroU64>,
}

impl<T> Clone for WorkerContext<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            aggregator: self.aggregator.clone(),
            barrier: self.barrier.clone(),
            limiter: self.limiter.clone(),
            stop: self.stop.clone(),
            abort: self.abort.clone(),
            budget: self.budget,
        }
    }
}

/// A fixed number of dispatch loops.
pub(crate) struct WorkerPool {
    tasks: Vec<JoinHandle<Result<u64, RunError>>>,
}

impl WorkerPool {
    pub fn spawn<T>(concurrency: usize, ctx: WorkerContext<T>) -> Self
    where
        T: RequestTarget + Sync + 'static,
    {
        let tasks = (0..concurrency)
            .map(|id| {
                let ctx = ctx.clone();
                tokio::spawn(
                    async move {
                        // Any exit, a panic included, ends the run.
                        let _stop = ctx.stop.clone().drop_guard();
                        let res = dispatch_loop(ctx).await;
                        if let Err(error) = &res {
                            error!("Worker failed: {error}");
                        }
                        res
                    }
                    .instrument(tracing::trace_span!("worker", id)),
                )
            })
            .collect();

        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every loop to exit and returns the number of dispatches each one made. All
    /// tasks are joined even when one of them failed; the first failure is returned.
    pub async fn join(self) -> Result<Vec<u64>, RunError> {
        let mut dispatched = Vec::with_capacity(self.tasks.len());
        let mut first_error = None;
        for task in self.tasks {
            match task.await.map_err(RunError::from).and_then(|res| res) {
                Ok(count) => dispatched.push(count),
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(dispatched),
        }
    }
}

async fn dispatch_loop<T>(ctx: WorkerContext<T>) -> Result<u64, RunError>
where
    T: RequestTarget + Sync,
{
    let signal = ctx.barrier.register();
    if !signal.wait(&ctx.stop).await {
        trace!("Stopped before start.");
        return Ok(0);
    }

    let mut dispatched = 0;
    loop {
        // Blocks on the next token when rate limited, otherwise only checks for stop.
        if !ctx.limiter.admit(&ctx.stop).await {
            break;
        }

        if !ctx.aggregator.reserve(ctx.budget)? {
            trace!("Request budget exhausted.");
            ctx.stop.cancel();
            break;
        }
        dispatched += 1;

        match ctx.target.send(&ctx.abort).await {
            Some(outcome) => ctx.aggregator.record(&outcome)?,
            None => {
                warn!("Target produced no outcome; skipping.");
                tokio::task::yield_now().await;
            }
        }
    }

    trace!("Worker exiting after {dispatched} dispatches.");
    Ok(dispatched)
}
