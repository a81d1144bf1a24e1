//! HTTP probe through a mock forward proxy.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use proxy_relay::health::{HealthProbe, HttpProbe};
use proxy_relay::upstream::UpstreamEndpoint;

mod common;

#[tokio::test]
async fn test_probe_healthy_through_proxy() {
    let seen = Arc::new(Mutex::new(String::new()));
    let captured = seen.clone();
    let addr = common::start_programmable_backend(move |request| {
        let captured = captured.clone();
        async move {
            *captured.lock().unwrap() = request;
            (200, "ok".to_string())
        }
    })
    .await;

    let upstream = UpstreamEndpoint::http("127.0.0.1", addr.port());
    let outcome = HttpProbe::new()
        .check(&upstream, "http://check.example.com/generate_204", Duration::from_secs(5))
        .await;

    assert!(outcome.healthy, "{:?}", outcome.message);
    assert!(outcome.latency_ms.is_some());
    // Sent to the proxy in absolute form.
    let request = seen.lock().unwrap().clone();
    assert!(request.starts_with("GET http://check.example.com/generate_204 "), "{request}");
}

#[tokio::test]
async fn test_probe_non_200_is_unhealthy() {
    let addr = common::start_mock_backend(503, "down").await;
    let upstream = UpstreamEndpoint::http("127.0.0.1", addr.port());

    let outcome = HttpProbe::new()
        .check(&upstream, "http://check.example.com/", Duration::from_secs(5))
        .await;

    assert!(!outcome.healthy);
    assert!(outcome.latency_ms.is_some());
    assert_eq!(outcome.message.as_deref(), Some("HTTP status code 503"));
}

#[tokio::test]
async fn test_probe_timeout_is_unhealthy() {
    let addr = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, "late".to_string())
    })
    .await;
    let upstream = UpstreamEndpoint::http("127.0.0.1", addr.port());

    let outcome = HttpProbe::new()
        .check(&upstream, "http://check.example.com/", Duration::from_millis(300))
        .await;

    assert!(!outcome.healthy);
    assert_eq!(outcome.message.as_deref(), Some("Timeout after 300ms"));
}
