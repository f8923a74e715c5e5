mod utils;
#[allow(unused)]
use utils::*;

use mock_service::MockServer;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use volley::prelude::*;
use volley::{ProgressLine, RunState};

fn settings(server: &MockServer, path: &str) -> RunSettings {
    RunSettings {
        url: server.url(path),
        concurrency: 5,
        timeout: Duration::from_secs(5),
        quiet: true,
        ..Default::default()
    }
}

fn http(settings: &RunSettings) -> HttpTarget {
    HttpTarget::new(
        &settings.url,
        &settings.method,
        &settings.headers,
        settings.body.clone(),
        settings.timeout,
        settings.keep_alive,
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn request_budget_is_exact() {
    let server = init().await;
    let settings = RunSettings {
        total: 50,
        ..settings(&server, "/delay/ms/10")
    };

    let summary = volley::run(settings.clone(), http(&settings)).await.unwrap();
    let report = summary.report;
    assert_eq!(report.counters.total, 50);
    assert_eq!(report.counters.success, 50);
    assert_eq!(report.success_rate, 1.);
    assert_eq!(server.hits(), 50);
    assert!(report.latency.min_ms >= 10.);
    assert!(report.latency.min_ms <= report.latency.p95_ms);
    assert!(report.latency.p95_ms <= report.latency.p99_ms);
    assert!(report.latency.p99_ms <= report.latency.max_ms);

    let rendered = metrics().render();
    assert!(rendered.contains("volley_requests_success"));
    assert!(rendered.contains("volley_request_latency"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn rate_limit_holds_over_duration() {
    let server = init().await;
    let settings = RunSettings {
        rate: 20,
        concurrency: 4,
        duration: Duration::from_secs(1),
        ..settings(&server, "/delay/ms/1")
    };

    let summary = volley::run(settings.clone(), http(&settings)).await.unwrap();
    let total = summary.report.counters.total;
    assert!((15..=25).contains(&total), "total = {total}");
    assert!(summary.report.duration >= Duration::from_secs(1));
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn server_errors_are_counted_as_failures() {
    let server = init().await;
    let settings = RunSettings {
        total: 20,
        ..settings(&server, "/status/500")
    };

    let report = volley::run(settings.clone(), http(&settings))
        .await
        .unwrap()
        .report;
    assert_eq!(report.counters.total, 20);
    assert_eq!(report.counters.failed, 20);
    assert_eq!(report.success_rate, 0.);
    assert_eq!(report.failure_rate(), 1.);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn unreachable_target_still_reports() {
    let settings = RunSettings {
        url: "http://127.0.0.1:1/".to_string(),
        concurrency: 2,
        total: 10,
        quiet: true,
        ..Default::default()
    };

    let report = volley::run(settings.clone(), http(&settings))
        .await
        .unwrap()
        .report;
    assert_eq!(report.counters.total, 10);
    assert_eq!(report.counters.failed, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn external_stop_lets_requests_finish() {
    let server = init().await;
    let settings = RunSettings {
        duration: Duration::from_secs(30),
        ..settings(&server, "/delay/ms/100")
    };

    let run = Run::new(settings.clone(), http(&settings));
    let handle = run.stop_handle();
    let state = run.state();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.stop();
    });

    let start = Instant::now();
    let report = run.execute().await.unwrap().report;
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(*state.borrow(), RunState::Done);
    assert!(report.counters.total >= 5);
    // Requests in flight at the stop still complete successfully.
    assert_eq!(report.counters.failed, 0);
    assert_eq!(report.counters.total, server.hits());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn abort_cancels_in_flight_requests() {
    let server = init().await;
    let settings = RunSettings {
        concurrency: 3,
        duration: Duration::from_secs(60),
        ..settings(&server, "/delay/ms/4000")
    };

    let run = Run::new(settings.clone(), http(&settings));
    let handle = run.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.abort();
    });

    let start = Instant::now();
    let report = run.execute().await.unwrap().report;
    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(report.counters.total, 3);
    assert_eq!(report.counters.failed, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn progress_lines_end_on_final_counts() {
    let server = init().await;
    let settings = RunSettings {
        quiet: false,
        duration: Duration::from_millis(2_500),
        rate: 40,
        ..settings(&server, "/delay/ms/5")
    };

    let lines = Arc::new(Mutex::new(Vec::<ProgressLine>::new()));
    let sink = {
        let lines = lines.clone();
        move |line: &ProgressLine| lines.lock().unwrap().push(line.clone())
    };

    let report = Run::new(settings.clone(), http(&settings))
        .progress(sink)
        .execute()
        .await
        .unwrap()
        .report;

    let lines = lines.lock().unwrap();
    assert!(lines.len() >= 3, "lines = {}", lines.len());
    let last = lines.last().unwrap();
    assert_eq!(last.counters, report.counters);
    assert_eq!(last.workers, 5);
    assert_eq!(last.ready, 5);
    assert!(lines
        .windows(2)
        .all(|w| w[0].counters.total <= w[1].counters.total));
}

#[tokio::test]
async fn invalid_settings_are_rejected_before_sending() {
    let server = init().await;
    let settings = RunSettings {
        concurrency: 0,
        total: 10,
        ..settings(&server, "/delay/ms/1")
    };

    let run = Run::new(settings.clone(), http(&settings));
    let state = run.state();
    let err = run.execute().await.unwrap_err();
    assert!(matches!(err, RunError::Config(_)));
    assert_eq!(err.to_string(), "invalid config: concurrency must be > 0");
    assert_eq!(*state.borrow(), RunState::Error);
    assert_eq!(server.hits(), 0);
}
