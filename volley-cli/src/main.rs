mod body;
mod report;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use volley::{HttpTarget, Run, StopHandle};
use volley_core::{RunSettings, DEFAULT_CONCURRENCY, DEFAULT_METHOD};

const DEFAULT_LOG_FILTER: &str = "volley=info,volley_core=info";

/// A high-performance HTTP load testing tool
#[derive(Parser, Debug)]
#[command(name = "volley", version, about)]
struct Cli {
    /// Target URL to stress test (e.g., http://localhost:8080/api)
    #[arg(short, long)]
    url: String,

    /// HTTP method (GET, POST, PUT, DELETE, etc.)
    #[arg(short, long, default_value = DEFAULT_METHOD)]
    method: String,

    /// Request body as a string
    #[arg(long, default_value = "")]
    body: String,

    /// Path to file containing request body (overrides --body)
    #[arg(long)]
    body_file: Option<PathBuf>,

    /// Custom HTTP header, repeatable (e.g., -H "Content-Type: application/json")
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Requests per second, 0 for unlimited
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    rate: i64,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY, allow_negative_numbers = true)]
    concurrency: i64,

    /// Duration of the test (e.g., 10s, 1m, 2h); 0s disables the timer
    #[arg(short, long, default_value = "30m", value_parser = humantime::parse_duration)]
    duration: Duration,

    /// Total number of requests to send, 0 for no cap
    #[arg(short = 'n', long, default_value_t = 0, allow_negative_numbers = true)]
    total: i64,

    /// Timeout for each request
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Output file for the report ("stdout" or empty for the terminal)
    #[arg(short, long)]
    output: Option<String>,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Disable HTTP keep-alive (use short-lived connections)
    #[arg(long)]
    disable_keepalive: bool,

    /// Expose Prometheus metrics on this address while the test runs
    #[arg(long)]
    prometheus: Option<SocketAddr>,
}

impl Cli {
    fn settings(&self) -> RunSettings {
        RunSettings {
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            body: vec![],
            rate: self.rate,
            concurrency: self.concurrency,
            duration: self.duration,
            total: self.total,
            timeout: self.timeout,
            quiet: self.quiet,
            keep_alive: !self.disable_keepalive,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("FATAL: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = cli.settings();
    settings.clone().validate().context("invalid config")?;

    settings.body = body::load(cli.body_file.as_deref(), &cli.body)
        .context("failed to load request body")?;

    let target = HttpTarget::new(
        &settings.url,
        &settings.method,
        &settings.headers,
        settings.body.clone(),
        settings.timeout,
        settings.keep_alive,
    )
    .context("failed to create target")?;

    if let Some(addr) = cli.prometheus {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to start Prometheus exporter")?;
        info!("Serving metrics on http://{addr}/metrics");
    }

    let run = Run::new(settings, target);
    handle_interrupts(run.stop_handle());
    let summary = run.execute().await.context("runner failed")?;

    let mut reporter = report::Reporter::open(cli.output.as_deref())?;
    reporter
        .write(&summary.config, &summary.report)
        .context("failed to write report")?;
    Ok(())
}

/// First Ctrl-C stops dispatching and lets in-flight requests finish, a second one aborts them.
fn handle_interrupts(handle: StopHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupted; waiting for in-flight requests. Press Ctrl-C again to abort them.");
        handle.stop();

        if tokio::signal::ctrl_c().await.is_ok() {
            handle.abort();
        }
    });
}
