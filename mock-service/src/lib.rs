use axum::{
    body::Bytes,
    debug_handler,
    extract::{ConnectInfo, Path, Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{any, get},
    Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use rand_distr::{Distribution, Normal};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, error, info};

/// A request as the echo route saw it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct ServiceState {
    hits: AtomicU64,
    tps: AtomicU64,
    last: Mutex<Option<RecordedRequest>>,
    peers: Mutex<HashSet<SocketAddr>>,
    limiters: Mutex<HashMap<u32, Arc<DefaultDirectRateLimiter>>>,
}

impl ServiceState {
    fn hit(&self, peer: SocketAddr) {
        counter!("mock_service_requests").increment(1);
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.tps.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut peers) = self.peers.lock() {
            peers.insert(peer);
        }
    }

    fn limiter(&self, tps: NonZeroU32) -> Option<Arc<DefaultDirectRateLimiter>> {
        let mut limiters = self.limiters.lock().ok()?;
        let limiter = limiters
            .entry(tps.get())
            .or_insert_with(|| Arc::new(RateLimiter::direct(Quota::per_second(tps))));
        Some(limiter.clone())
    }
}

pub fn router(state: Arc<ServiceState>) -> Router {
    Router::new()
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/jitter/ms/:mean_ms/:std_dev_ms", get(jitter))
        .route("/status/:code", any(status))
        .route("/limited/:max_tps", get(limited))
        .route("/echo", any(echo))
        .layer(middleware::from_fn_with_state(state.clone(), track))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<ServiceState>) -> anyhow::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await?;
    Ok(())
}

/// An in-process instance bound to an ephemeral loopback port. Stops when dropped.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServiceState>,
    handle: JoinHandle<()>,
}

pub async fn spawn() -> anyhow::Result<MockServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = Arc::new(ServiceState::default());

    let handle = tokio::spawn({
        let state = state.clone();
        async move {
            if let Err(err) = serve(listener, state).await {
                error!("Mock service failed: {err}");
            }
        }
    });
    debug!("Mock service listening on {addr}");

    Ok(MockServer {
        addr,
        state,
        handle,
    })
}

impl MockServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Requests received on any route.
    pub fn hits(&self) -> u64 {
        self.state.hits.load(Ordering::Relaxed)
    }

    /// Distinct client sockets seen, i.e. TCP connections opened against the service.
    pub fn connections(&self) -> usize {
        self.state.peers.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state.last.lock().ok()?.clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn track(
    State(state): State<Arc<ServiceState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    state.hit(peer);
    next.run(request).await
}

#[debug_handler]
async fn delay(Path(delay_ms): Path<u64>) {
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[debug_handler]
async fn jitter(Path((mean_ms, std_dev_ms)): Path<(f64, f64)>) -> Result<(), StatusCode> {
    let normal = Normal::new(mean_ms, std_dev_ms).map_err(|_| StatusCode::BAD_REQUEST)?;
    let delay_ms = normal.sample(&mut rand::thread_rng()).max(0.);
    tokio::time::sleep(Duration::from_secs_f64(delay_ms / 1000.)).await;
    Ok(())
}

#[debug_handler]
async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

#[debug_handler]
async fn limited(
    State(state): State<Arc<ServiceState>>,
    Path(max_tps): Path<u32>,
) -> Result<(), StatusCode> {
    let tps = NonZeroU32::new(max_tps).ok_or(StatusCode::BAD_REQUEST)?;
    let limiter = state
        .limiter(tps)
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    limiter
        .check()
        .map_err(|_| StatusCode::TOO_MANY_REQUESTS)
}

#[debug_handler]
async fn echo(
    State(state): State<Arc<ServiceState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Bytes {
    let headers = headers
        .iter()
        .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
        .collect();
    let recorded = RecordedRequest {
        method: method.to_string(),
        headers,
        body: body.to_vec(),
    };
    if let Ok(mut last) = state.last.lock() {
        *last = Some(recorded);
    }
    body
}

/** TPS Printer **/

pub async fn tps_measure_task(state: Arc<ServiceState>) {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let transactions = state.tps.swap(0, Ordering::Relaxed);
        info!("{transactions} TPS");
    }
}
