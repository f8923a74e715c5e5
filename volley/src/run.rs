//! Run orchestration
use crate::aggregator::SharedAggregator;
use crate::barrier::StartBarrier;
use crate::error::RunError;
use crate::limiter::RateLimiter;
use crate::progress::{ProgressReporter, ProgressSink, StdoutSink};
use crate::stop::{StopController, StopHandle};
use crate::target::RequestTarget;
use crate::worker::{WorkerContext, WorkerPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};
use volley_core::{FinalReport, RunConfig, RunSettings, PROGRESS_INTERVAL};

/// Lifecycle of a [`Run`]. States only ever move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Init,
    Validating,
    /// Workers are spawned and registering with the start barrier.
    WaitingReady,
    Running,
    Draining,
    Aggregating,
    Done,
    /// Rejected before any request was sent.
    Error,
}

/// What a finished run hands to the reporting layer.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub config: RunConfig,
    pub report: FinalReport,
}

/// A single-use load run against one [`RequestTarget`].
///
/// # Example
/// ```no_run
/// use volley::prelude::*;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = RunSettings {
///         url: "http://127.0.0.1:3002/delay/ms/10".to_string(),
///         concurrency: 8,
///         duration: Duration::from_secs(10),
///         ..Default::default()
///     };
///     let target = HttpTarget::new(&settings.url, "GET", &settings.headers, vec![], settings.timeout, true)?;
///     let summary = Run::new(settings, target).execute().await?;
///     println!("p99 = {}ms", summary.report.latency.p99_ms);
///     Ok(())
/// }
/// ```
pub struct Run<T> {
    settings: RunSettings,
    target: T,
    handle: StopHandle,
    sink: Option<Box<dyn ProgressSink>>,
    progress_interval: Duration,
    state: watch::Sender<RunState>,
}

impl<T> Run<T>
where
    T: RequestTarget + Sync + 'static,
{
    pub fn new(settings: RunSettings, target: T) -> Self {
        let (state, _) = watch::channel(RunState::Init);
        Self {
            settings,
            target,
            handle: StopHandle::new(),
            sink: None,
            progress_interval: PROGRESS_INTERVAL,
            state,
        }
    }

    /// Send progress lines somewhere other than stdout. Ignored for quiet runs.
    pub fn progress(mut self, sink: impl ProgressSink) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Control the run from another task, e.g. a Ctrl-C handler.
    pub fn stop_handle(&self) -> StopHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    #[instrument(name = "run", skip_all, fields(url = %self.settings.url))]
    pub async fn execute(self) -> Result<RunSummary, RunError> {
        let Self {
            settings,
            target,
            handle,
            sink,
            progress_interval,
            state,
        } = self;

        advance(&state, RunState::Validating);
        let config = match settings.validate() {
            Ok(config) => config,
            Err(error) => {
                advance(&state, RunState::Error);
                return Err(error.into());
            }
        };
        info!(
            "Running {} {} with {} workers, rate {:?}, stopping {}",
            config.method(),
            config.url(),
            config.concurrency(),
            config.rate(),
            config.stop()
        );

        let concurrency = config.concurrency().get();
        let aggregator = Arc::new(SharedAggregator::new());
        let barrier = Arc::new(StartBarrier::new(concurrency));
        let stop = StopController::new(config.stop(), handle);
        let finished = CancellationToken::new();

        advance(&state, RunState::WaitingReady);
        let reporter = if config.quiet() {
            None
        } else {
            let sink = sink.unwrap_or_else(|| Box::new(StdoutSink));
            Some(
                ProgressReporter::new(
                    aggregator.clone(),
                    barrier.clone(),
                    finished.clone(),
                    progress_interval,
                    sink,
                )
                .spawn(),
            )
        };

        let pool = WorkerPool::spawn(
            concurrency,
            WorkerContext {
                target: Arc::new(target),
                aggregator: aggregator.clone(),
                barrier: barrier.clone(),
                limiter: RateLimiter::new(config.rate()),
                stop: stop.stop_token().clone(),
                abort: stop.abort_token().clone(),
                budget: config.stop().budget(),
            },
        );

        tokio::select! {
            _ = barrier.all_ready() => debug!("All {} workers ready.", pool.len()),
            _ = stop.stop_token().cancelled() => debug!("Stopped while waiting for workers."),
        }
        let started = barrier.release();
        advance(&state, RunState::Running);

        stop.wait(started).await;
        advance(&state, RunState::Draining);

        let workers = pool.join().await;
        finished.cancel();
        let progress = match reporter {
            Some(reporter) => reporter.await.map_err(RunError::from).and_then(|res| res),
            None => Ok(()),
        };
        let elapsed = started.elapsed();

        let dispatched = workers?;
        progress?;
        trace!("Dispatches per worker: {dispatched:?}");

        advance(&state, RunState::Aggregating);
        let report = FinalReport::compute(aggregator.snapshot()?, elapsed);
        advance(&state, RunState::Done);

        info!(
            "Run complete: {} requests in {:?} ({:.2} RPS)",
            report.counters.total, report.duration, report.rps
        );

        Ok(RunSummary { config, report })
    }
}

/// Validate `settings`, run against `target` and return the summary.
pub async fn run<T>(settings: RunSettings, target: T) -> Result<RunSummary, RunError>
where
    T: RequestTarget + Sync + 'static,
{
    Run::new(settings, target).execute().await
}

fn advance(state: &watch::Sender<RunState>, next: RunState) {
    let prev = state.send_replace(next);
    debug_assert!(prev < next, "run state moved backwards: {prev:?} -> {next:?}");
    debug!("{prev:?} -> {next:?}");
}
