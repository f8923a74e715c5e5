use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One-shot rendezvous that holds every worker back until all of them are ready.
///
/// Workers call [`StartBarrier::register`] and then wait on the returned [`StartSignal`]. The
/// orchestrator waits in [`StartBarrier::all_ready`] and then calls [`StartBarrier::release`].
pub(crate) struct StartBarrier {
    parties: usize,
    ready: AtomicUsize,
    all_ready: Notify,
    go: watch::Sender<Option<Instant>>,
}

impl StartBarrier {
    pub fn new(parties: usize) -> Self {
        let (go, _) = watch::channel(None);
        Self {
            parties,
            ready: AtomicUsize::new(0),
            all_ready: Notify::new(),
            go,
        }
    }

    /// Marks one more worker ready and hands it the signal to wait on.
    pub fn register(&self) -> StartSignal {
        // Subscribe before counting so the release can never be missed.
        let go = self.go.subscribe();
        if self.ready.fetch_add(1, Ordering::AcqRel) + 1 >= self.parties {
            // `notify_one` stores a permit if nobody is waiting yet.
            self.all_ready.notify_one();
        }
        StartSignal { go }
    }

    pub fn ready(&self) -> usize {
        self.ready.load(Ordering::Acquire)
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    pub async fn all_ready(&self) {
        while self.ready() < self.parties {
            self.all_ready.notified().await;
        }
    }

    /// Broadcasts "go" and returns the instant of the first release. Idempotent.
    pub fn release(&self) -> Instant {
        let mut started = Instant::now();
        self.go.send_if_modified(|go| match go {
            Some(at) => {
                started = *at;
                false
            }
            None => {
                *go = Some(started);
                true
            }
        });
        started
    }

    pub fn released_at(&self) -> Option<Instant> {
        *self.go.borrow()
    }
}

pub(crate) struct StartSignal {
    go: watch::Receiver<Option<Instant>>,
}

impl StartSignal {
    /// Resolves `true` on release, `false` if `stop` fires first.
    pub async fn wait(mut self, stop: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            res = self.go.wait_for(Option::is_some) => res.is_ok(),
            _ = stop.cancelled() => false,
        }
    }
}
