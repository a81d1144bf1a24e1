//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_probes_total` (counter): probes by port and result
//! - `relay_probe_latency_ms` (histogram): latency of successful probes
//! - `relay_failure_count` (gauge): consecutive failures per port
//! - `relay_switches_total` (counter): switches by port, reason and outcome
//! - `relay_acquisitions_total` (counter): provider fetches by outcome

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(port: u16, healthy: bool, latency_ms: Option<u64>) {
    let result = if healthy { "healthy" } else { "unhealthy" };
    counter!("relay_probes_total", "port" => port.to_string(), "result" => result).increment(1);
    if let (true, Some(ms)) = (healthy, latency_ms) {
        histogram!("relay_probe_latency_ms", "port" => port.to_string()).record(ms as f64);
    }
}

pub fn record_failure_count(port: u16, failures: u32) {
    gauge!("relay_failure_count", "port" => port.to_string()).set(failures as f64);
}

pub fn record_switch(port: u16, reason: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "relay_switches_total",
        "port" => port.to_string(),
        "reason" => reason,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_acquisition(provider: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("relay_acquisitions_total", "provider" => provider.to_string(), "outcome" => outcome).increment(1);
}
