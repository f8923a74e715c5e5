use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use mock_service::MockServer;
use std::sync::OnceLock;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs logging and the metrics recorder once per test binary, then starts a fresh mock
/// service for the calling test.
#[allow(unused)]
pub async fn init() -> MockServer {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new(
                "volley=debug,mock_service=debug,axum::rejection=trace",
            ))
            .with_test_writer()
            .try_init();

        metrics();
    });

    mock_service::spawn().await.unwrap()
}

#[allow(unused)]
pub fn metrics() -> &'static PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE.get_or_init(|| PrometheusBuilder::new().install_recorder().unwrap())
}
