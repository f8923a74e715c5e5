use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::{serve, tps_measure_task, ServiceState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info")),
        )
        .init();

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], 8081))
        .install()?;

    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:3002".to_string())
        .parse()?;

    let state = Arc::new(ServiceState::default());
    tokio::spawn(tps_measure_task(state.clone()));

    let listener = TcpListener::bind(addr).await?;
    info!("Mock service listening on {addr}");
    serve(listener, state).await
}
