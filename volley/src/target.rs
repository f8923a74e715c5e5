use tokio_util::sync::CancellationToken;
use volley_core::Outcome;

/// Something that can be hit with one request at a time.
///
/// Implementations time the request themselves, from the moment it is issued until the response
/// has been fully received or a terminal error occurred. Transport failures are reported as a
/// failed [`Outcome`], never as a panic. When `abort` fires mid-flight the request must be
/// dropped promptly and a failed [`Outcome`] returned.
///
/// `None` means no attempt was made; the worker skips the iteration without recording.
#[trait_variant::make(RequestTarget: Send)]
pub trait LocalRequestTarget {
    async fn send(&self, abort: &CancellationToken) -> Option<Outcome>;
}
