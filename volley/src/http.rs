use crate::target::RequestTarget;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, trace, warn};
use volley_core::{parse_headers, ConfigError, Outcome, RunConfig};

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("URL is required")]
    EmptyUrl,

    #[error("invalid URL {0:?}: {1}")]
    InvalidUrl(String, String),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error(transparent)]
    Header(#[from] ConfigError),

    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Reusable HTTP sender for a single endpoint.
#[derive(Clone, Debug)]
pub struct HttpTarget {
    client: Client,
    method: Method,
    url: reqwest::Url,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl HttpTarget {
    /// `headers` are `"Key: Value"` strings; an empty method means `GET`.
    pub fn new<S: AsRef<str>>(
        url: &str,
        method: &str,
        headers: &[S],
        body: Vec<u8>,
        timeout: Duration,
        keep_alive: bool,
    ) -> Result<Self, TargetError> {
        if url.is_empty() {
            return Err(TargetError::EmptyUrl);
        }
        let parsed_url = reqwest::Url::parse(url)
            .map_err(|e| TargetError::InvalidUrl(url.to_string(), e.to_string()))?;

        let method = if method.is_empty() { "GET" } else { method };
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| TargetError::InvalidMethod(method.to_string()))?;

        let mut header_map = HeaderMap::new();
        for (key, value) in parse_headers(headers)? {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| TargetError::InvalidHeader(key.clone()))?;
            let value =
                HeaderValue::from_str(&value).map_err(|_| TargetError::InvalidHeader(key))?;
            header_map.insert(name, value);
        }

        let mut builder = Client::builder().timeout(timeout);
        if !keep_alive {
            builder = builder.pool_max_idle_per_host(0);
        }

        Ok(Self {
            client: builder.build()?,
            method,
            url: parsed_url,
            headers: header_map,
            body,
        })
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, TargetError> {
        Self::new(
            config.url(),
            config.method(),
            config.raw_headers(),
            config.body().to_vec(),
            config.timeout(),
            config.keep_alive(),
        )
    }

    async fn exchange(&self, start: Instant) -> Outcome {
        let mut request = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if !self.body.is_empty() {
            request = request.body(self.body.clone());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Outcome::failure(e, start.elapsed()),
        };
        let status = response.status().as_u16();

        // Drain the body so the connection goes back to the pool.
        match response.bytes().await {
            Ok(_) => Outcome::response(status, start.elapsed()),
            Err(e) => {
                let mut outcome = Outcome::failure(e, start.elapsed());
                outcome.status = Some(status);
                outcome
            }
        }
    }
}

impl RequestTarget for HttpTarget {
    async fn send(&self, abort: &CancellationToken) -> Option<Outcome> {
        let start = Instant::now();
        let outcome = tokio::select! {
            outcome = self.exchange(start) => outcome,
            _ = abort.cancelled() => Outcome::failure("request aborted", start.elapsed()),
        };

        if let Some(error) = &outcome.error {
            trace!("Request failed: {error}");
        }
        Some(outcome)
    }
}
