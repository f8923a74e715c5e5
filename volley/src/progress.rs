use crate::aggregator::SharedAggregator;
use crate::barrier::StartBarrier;
use crate::error::RunError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, trace};
use volley_core::{Counters, LatencyStats};

/// One live status line, computed from a partial snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressLine {
    pub ready: usize,
    pub workers: usize,
    pub counters: Counters,
    pub rps: f64,
    pub latency: LatencyStats,
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Workers: {}/{} | RPS: {:.1} | Total: {} | Success: {:.1}% | Failed: {} | Avg: {:.1}ms | Min: {}ms | Max: {}ms | P95: {}ms | P99: {}ms",
            self.ready,
            self.workers,
            self.rps,
            self.counters.total,
            self.counters.success_rate() * 100.,
            self.counters.failed,
            self.latency.avg_ms,
            self.latency.min_ms,
            self.latency.max_ms,
            self.latency.p95_ms,
            self.latency.p99_ms,
        )
    }
}

/// Destination for progress lines.
pub trait ProgressSink: Send + 'static {
    fn emit(&mut self, line: &ProgressLine);
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressLine) + Send + 'static,
{
    fn emit(&mut self, line: &ProgressLine) {
        self(line)
    }
}

/// Prints every line to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn emit(&mut self, line: &ProgressLine) {
        println!("{line}");
    }
}

/// Periodic read-only view of a running aggregator.
///
/// Ticks until `finished` fires, then emits exactly one last line so the final output reflects
/// the terminal state. RPS counts from the start broadcast, not from when the reporter began.
/// Each tick sorts the whole sample collected so far; fine at a one second cadence, but the
/// cost grows with run length.
pub(crate) struct ProgressReporter {
    aggregator: Arc<SharedAggregator>,
    barrier: Arc<StartBarrier>,
    finished: CancellationToken,
    interval: Duration,
    sink: Box<dyn ProgressSink>,
}

impl ProgressReporter {
    pub fn new(
        aggregator: Arc<SharedAggregator>,
        barrier: Arc<StartBarrier>,
        finished: CancellationToken,
        interval: Duration,
        sink: Box<dyn ProgressSink>,
    ) -> Self {
        Self {
            aggregator,
            barrier,
            finished,
            interval,
            sink,
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<(), RunError>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<(), RunError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        ticker.tick().await;

        let finished = self.finished.clone();
        loop {
            tokio::select! {
                _ = finished.cancelled() => {
                    self.emit()?;
                    trace!("Progress reporter exiting.");
                    return Ok(());
                }
                _ = ticker.tick() => self.emit()?,
            }
        }
    }

    fn emit(&mut self) -> Result<(), RunError> {
        let elapsed = self
            .barrier
            .released_at()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let line = self.line(elapsed)?;
        self.sink.emit(&line);
        Ok(())
    }

    fn line(&self, elapsed: Duration) -> Result<ProgressLine, RunError> {
        let mut snapshot = self.aggregator.snapshot()?;
        let latency = LatencyStats::from_sample(&mut snapshot.latencies);
        Ok(ProgressLine {
            ready: self.barrier.ready(),
            workers: self.barrier.parties(),
            counters: snapshot.counters,
            // Clamp so the first ticks do not spike.
            rps: snapshot.counters.rps(elapsed.max(Duration::from_secs(1))),
            latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use volley_core::Outcome;

    fn collector() -> (Arc<Mutex<Vec<ProgressLine>>>, Box<dyn ProgressSink>) {
        let lines = Arc::new(Mutex::new(vec![]));
        let sink = {
            let lines = lines.clone();
            move |line: &ProgressLine| lines.lock().unwrap().push(line.clone())
        };
        (lines, Box::new(sink))
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_then_prints_final_line_once() {
        let aggregator = Arc::new(SharedAggregator::new());
        let barrier = Arc::new(StartBarrier::new(2));
        let finished = CancellationToken::new();
        let (lines, sink) = collector();

        let handle = ProgressReporter::new(
            aggregator.clone(),
            barrier.clone(),
            finished.clone(),
            Duration::from_secs(1),
            sink,
        )
        .spawn();

        let _a = barrier.register();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        for ms in [10, 20, 30] {
            aggregator
                .record(&Outcome::response(200, Duration::from_millis(ms)))
                .unwrap();
        }
        aggregator
            .record(&Outcome::failure("refused", Duration::from_millis(1)))
            .unwrap();
        finished.cancel();
        handle.await.unwrap().unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].counters.total, 0);
        assert_eq!(lines[0].ready, 1);
        assert_eq!(lines[0].workers, 2);

        let last = lines.last().unwrap();
        assert_eq!(last.counters.total, 4);
        assert_eq!(last.counters.failed, 1);
        assert_eq!(last.latency.max_ms, 30.);
        assert_eq!(last.latency.min_ms, 1.);
    }

    #[tokio::test(start_paused = true)]
    async fn rps_counts_from_release() {
        let aggregator = Arc::new(SharedAggregator::new());
        let barrier = Arc::new(StartBarrier::new(1));
        let finished = CancellationToken::new();
        let (lines, sink) = collector();

        let handle = ProgressReporter::new(
            aggregator.clone(),
            barrier.clone(),
            finished.clone(),
            Duration::from_secs(10),
            sink,
        )
        .spawn();

        // Time spent waiting for workers does not dilute the rate.
        let _a = barrier.register();
        tokio::time::sleep(Duration::from_secs(5)).await;
        barrier.release();
        for _ in 0..4 {
            aggregator
                .record(&Outcome::response(200, Duration::from_millis(5)))
                .unwrap();
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        finished.cancel();
        handle.await.unwrap().unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(lines.last().unwrap().rps, 2.);
    }

    #[test]
    fn line_format() {
        let line = ProgressLine {
            ready: 5,
            workers: 5,
            counters: Counters {
                total: 4,
                success: 3,
                failed: 1,
            },
            rps: 2.,
            latency: LatencyStats {
                avg_ms: 15.5,
                min_ms: 1.,
                max_ms: 30.,
                p95_ms: 30.,
                p99_ms: 30.,
            },
        };
        assert_eq!(
            line.to_string(),
            "Workers: 5/5 | RPS: 2.0 | Total: 4 | Success: 75.0% | Failed: 1 | Avg: 15.5ms | Min: 1ms | Max: 30ms | P95: 30ms | P99: 30ms"
        );
    }
}
