//! Health probing through an upstream.
//!
//! # Responsibilities
//! - Dial `check_url` through the upstream as a forward proxy
//! - Measure end-to-end latency
//! - Turn every failure into an unhealthy outcome; probing never errors

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::{Duration, Instant};

use crate::upstream::UpstreamEndpoint;

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
}

impl ProbeOutcome {
    pub fn healthy(latency_ms: Option<u64>) -> Self {
        Self { healthy: true, latency_ms, message: None }
    }

    pub fn unhealthy(latency_ms: Option<u64>, message: impl Into<String>) -> Self {
        Self { healthy: false, latency_ms, message: Some(message.into()) }
    }
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, upstream: &UpstreamEndpoint, check_url: &str, timeout: Duration) -> ProbeOutcome;
}

/// Probes by sending `GET check_url` through the upstream. Only `200 OK`
/// counts as healthy.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self, upstream: &UpstreamEndpoint, check_url: &str, timeout: Duration) -> ProbeOutcome {
        if !upstream.is_probeable() {
            return ProbeOutcome {
                healthy: true,
                latency_ms: None,
                message: Some("VLESS cannot be probed over HTTP; health is inferred from actual use".into()),
            };
        }

        let proxy_url = match upstream.proxy_url() {
            Ok(Some(url)) => url,
            Ok(None) => return ProbeOutcome::unhealthy(None, "upstream has no proxy address"),
            Err(e) => return ProbeOutcome::unhealthy(None, format!("invalid proxy address: {}", e)),
        };

        let client = match reqwest::Proxy::all(proxy_url.as_str())
            .and_then(|proxy| reqwest::Client::builder().proxy(proxy).timeout(timeout).build())
        {
            Ok(client) => client,
            Err(e) => return ProbeOutcome::unhealthy(None, format!("failed to build probe client: {}", e)),
        };

        tracing::debug!(upstream = %upstream, check_url, "Probing upstream");
        let started = Instant::now();
        match client.get(check_url).send().await {
            Ok(response) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                if response.status() == StatusCode::OK {
                    ProbeOutcome::healthy(Some(latency_ms))
                } else {
                    ProbeOutcome::unhealthy(Some(latency_ms), format!("HTTP status code {}", response.status().as_u16()))
                }
            }
            Err(e) if e.is_timeout() => {
                ProbeOutcome::unhealthy(None, format!("Timeout after {:?}", timeout))
            }
            Err(e) if e.is_connect() => ProbeOutcome::unhealthy(None, format!("Connection error: {}", e)),
            Err(e) => ProbeOutcome::unhealthy(None, format!("Probe error: {}", e)),
        }
    }
}
