mod utils;
#[allow(unused)]
use utils::*;

use std::time::Duration;
use volley::prelude::*;

fn target(url: &str, method: &str, headers: &[&str], body: &[u8], keep_alive: bool) -> HttpTarget {
    HttpTarget::new(
        url,
        method,
        headers,
        body.to_vec(),
        Duration::from_secs(2),
        keep_alive,
    )
    .unwrap()
}

#[tokio::test]
async fn success_is_2xx() {
    let server = init().await;
    let target = target(&server.url("/delay/ms/20"), "GET", &[], b"", true);

    let outcome = target.send(&CancellationToken::new()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.status, Some(200));
    assert_eq!(outcome.error, None);
    assert!(outcome.latency >= Duration::from_millis(20));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn non_2xx_is_failure_with_status() {
    let server = init().await;

    for code in [301, 404, 503] {
        let target = target(&server.url(&format!("/status/{code}")), "GET", &[], b"", true);
        let outcome = target.send(&CancellationToken::new()).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status, Some(code));
    }

    let target = target(&server.url("/status/204"), "DELETE", &[], b"", true);
    let outcome = target.send(&CancellationToken::new()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.status, Some(204));
}

#[tokio::test]
async fn connection_refused_is_failure() {
    let server = init().await;
    let target = target("http://127.0.0.1:1/delay/ms/1", "GET", &[], b"", true);
    let outcome = target.send(&CancellationToken::new()).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.status, None);
    assert!(outcome.error.is_some());
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
#[ntest::timeout(5_000)]
async fn timeout_is_failure() {
    let server = init().await;
    let target = HttpTarget::new(
        &server.url("/delay/ms/2000"),
        "GET",
        &[] as &[&str],
        vec![],
        Duration::from_millis(100),
        true,
    )
    .unwrap();

    let outcome = target.send(&CancellationToken::new()).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.status, None);
    assert!(outcome.error.is_some());
    assert!(outcome.latency >= Duration::from_millis(100));
    assert!(outcome.latency < Duration::from_millis(2000));
}

#[tokio::test]
#[ntest::timeout(5_000)]
async fn abort_cancels_in_flight_request() {
    let server = init().await;
    let target = target(&server.url("/delay/ms/1500"), "GET", &[], b"", true);

    let abort = CancellationToken::new();
    let trigger = abort.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = target.send(&abort).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("request aborted"));
    assert!(outcome.latency < Duration::from_millis(1500));
}

#[tokio::test]
async fn headers_method_and_body_are_delivered() {
    let server = init().await;
    let target = target(
        &server.url("/echo"),
        "put",
        &["Content-Type: application/json", "X-Run : first", "X-Run: second"],
        br#"{"hello":"world"}"#,
        true,
    );

    let outcome = target.send(&CancellationToken::new()).await.unwrap();
    assert!(outcome.success);

    let request = server.last_request().unwrap();
    assert_eq!(request.method, "PUT");
    assert_eq!(request.body, br#"{"hello":"world"}"#);
    assert_eq!(
        request.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
    // Later entries for the same key win.
    assert_eq!(request.headers.get("x-run").map(String::as_str), Some("second"));
}

#[tokio::test]
async fn keep_alive_reuses_connections() {
    let server = init().await;
    let target = target(&server.url("/delay/ms/1"), "GET", &[], b"", true);
    for _ in 0..5 {
        assert!(target.send(&CancellationToken::new()).await.unwrap().success);
    }
    assert_eq!(server.hits(), 5);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn disabled_keep_alive_opens_a_connection_per_request() {
    let server = init().await;
    let target = target(&server.url("/delay/ms/1"), "GET", &[], b"", false);
    for _ in 0..5 {
        assert!(target.send(&CancellationToken::new()).await.unwrap().success);
    }
    assert_eq!(server.hits(), 5);
    assert_eq!(server.connections(), 5);
}
