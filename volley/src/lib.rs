#![cfg_attr(docsrs, feature(doc_cfg))]
//! Concurrent HTTP load generation with a synchronized start, an exact request budget and
//! nearest-rank latency statistics.
//!
//! A [`Run`] spawns a fixed pool of workers against one [`RequestTarget`], holds them at a start
//! barrier until every worker is ready, then dispatches until the duration elapses or the
//! request budget is spent. The result is a [`FinalReport`](volley_core::FinalReport).

mod aggregator;
mod barrier;
mod error;
pub mod http;
mod limiter;
mod progress;
mod run;
mod stop;
pub mod target;
mod worker;

pub use error::RunError;
pub use http::{HttpTarget, TargetError};
pub use progress::{ProgressLine, ProgressSink, StdoutSink};
pub use run::{run, Run, RunState, RunSummary};
pub use stop::StopHandle;
pub use target::RequestTarget;

pub mod prelude {
    pub use crate::{HttpTarget, RequestTarget, Run, RunError, RunSummary, StopHandle};
    pub use tokio_util::sync::CancellationToken;
    pub use volley_core::{FinalReport, Outcome, RunConfig, RunSettings};
}
