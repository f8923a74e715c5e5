use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Admission tokens shared by every worker of a run.
///
/// One token every `1/rate` seconds with a burst of one, so exactly one waiting worker is
/// admitted per period. Unlimited runs carry no limiter at all.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RateLimiter {
    pub fn new(rate: Option<NonZeroU32>) -> Self {
        Self {
            limiter: rate.map(|rate| Arc::new(rate_limiter(rate))),
        }
    }

    pub fn is_limited(&self) -> bool {
        self.limiter.is_some()
    }

    /// Waits for the next token. Returns `false` if `stop` fired first, or was already set.
    ///
    /// Unlimited runs still yield once per call so a target that never suspends cannot starve
    /// the timer or the other workers.
    pub async fn admit(&self, stop: &CancellationToken) -> bool {
        if stop.is_cancelled() {
            return false;
        }

        match &self.limiter {
            Some(limiter) => tokio::select! {
                biased;
                _ = stop.cancelled() => false,
                _ = limiter.until_ready() => true,
            },
            None => {
                tokio::task::yield_now().await;
                !stop.is_cancelled()
            }
        }
    }
}

fn rate_limiter(rate: NonZeroU32) -> DefaultDirectRateLimiter {
    governor::RateLimiter::direct(Quota::per_second(rate).allow_burst(NonZeroU32::MIN))
}
