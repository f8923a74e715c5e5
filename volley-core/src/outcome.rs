use std::time::Duration;

/// Result of exactly one dispatched request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub status: Option<u16>,
    pub latency: Duration,
    pub error: Option<String>,
}

impl Outcome {
    /// A response was received. Only 2xx counts as success.
    pub fn response(status: u16, latency: Duration) -> Self {
        Self {
            success: (200..300).contains(&status),
            status: Some(status),
            latency,
            error: None,
        }
    }

    /// The request never produced a response.
    pub fn failure(error: impl ToString, latency: Duration) -> Self {
        Self {
            success: false,
            status: None,
            latency,
            error: Some(error.to_string()),
        }
    }
}
