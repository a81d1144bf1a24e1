//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use proxy_relay::acquisition::{Acquire, AcquisitionError};
use proxy_relay::config::schema::{
    GenericFormat, HttpMethod, PortBinding, ProviderConfig, RelayConfig, ResponseFormat,
};
use proxy_relay::config::{ConfigError, ConfigStore, LiveConfig};
use proxy_relay::engine::{ApplyError, ConfigApplier};
use proxy_relay::failover::FailoverCoordinator;
use proxy_relay::health::{HealthProbe, PortMonitor, ProbeOutcome};
use proxy_relay::history::MemoryHistory;
use proxy_relay::upstream::UpstreamEndpoint;

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (status, body.to_string()) }).await
}

/// Start a programmable mock backend. `f` receives the raw request and
/// returns the status and body to send back.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read one HTTP/1.1 request: head plus `Content-Length` bytes of body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn provider(id: &str, endpoint: &str) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        name: id.to_string(),
        enabled: true,
        endpoint: endpoint.to_string(),
        method: HttpMethod::Get,
        params: Default::default(),
        headers: Default::default(),
        body: None,
        timeout_secs: 5,
        retry_attempts: 0,
        backoff_base: 2.0,
        response_format: ResponseFormat::Generic(GenericFormat {
            success_field: None,
            success_value: Value::Bool(true),
            data_path: String::new(),
            ip_field: "ip".into(),
            port_field: "port".into(),
            username_field: None,
            password_field: None,
        }),
    }
}

pub fn binding(local_port: u16, upstream: Option<UpstreamEndpoint>) -> PortBinding {
    PortBinding {
        local_port,
        name: format!("port-{}", local_port),
        provider: Some("pool".into()),
        monitoring: upstream.is_some(),
        local_username: None,
        local_password: None,
        upstream,
    }
}

/// One provider `pool`, 1s interval, threshold 3.
pub fn relay_config(bindings: Vec<PortBinding>) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.monitoring.check_interval_secs = 1;
    config.monitoring.failure_threshold = 3;
    config.monitoring.check_timeout_secs = 1;
    config.providers.push(provider("pool", "http://127.0.0.1:1/"));
    config.ports = bindings;
    config
}

/// Config store that keeps every saved document.
#[derive(Default)]
pub struct RecordingStore {
    pub saved: Mutex<Vec<RelayConfig>>,
}

impl ConfigStore for RecordingStore {
    fn load(&self) -> Result<RelayConfig, ConfigError> {
        Ok(self.saved.lock().unwrap().last().cloned().unwrap_or_default())
    }

    fn save(&self, config: &RelayConfig) -> Result<(), ConfigError> {
        self.saved.lock().unwrap().push(config.clone());
        Ok(())
    }
}

/// Applier that fails every apply while `failing` is set.
#[derive(Default)]
pub struct SwitchableApplier {
    pub failing: std::sync::atomic::AtomicBool,
    pub applies: AtomicUsize,
    delay: Mutex<Duration>,
}

impl SwitchableApplier {
    pub fn failing() -> Self {
        let applier = Self::default();
        applier.failing.store(true, Ordering::SeqCst);
        applier
    }

    /// Every apply takes `delay` before reporting.
    pub fn slow(delay: Duration) -> Self {
        let applier = Self::default();
        *applier.delay.lock().unwrap() = delay;
        applier
    }
}

#[async_trait]
impl ConfigApplier for SwitchableApplier {
    async fn apply(&self, _rendered: &Value) -> Result<(), ApplyError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            Err(ApplyError::Reload("engine rejected configuration".into()))
        } else {
            Ok(())
        }
    }
}

/// Probe whose verdict depends on the upstream server name.
#[derive(Default)]
pub struct ScriptedProbe {
    healthy: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedProbe {
    pub fn healthy(servers: &[&str]) -> Self {
        let probe = Self::default();
        probe.healthy.lock().unwrap().extend(servers.iter().map(|s| s.to_string()));
        probe
    }

    /// Probes of `server` never complete.
    pub fn hang(&self, server: &str) {
        self.hanging.lock().unwrap().insert(server.to_string());
    }

    pub fn calls(&self, server: &str) -> usize {
        self.calls.lock().unwrap().get(server).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn check(&self, upstream: &UpstreamEndpoint, _check_url: &str, _timeout: Duration) -> ProbeOutcome {
        let server = upstream.server().to_string();
        *self.calls.lock().unwrap().entry(server.clone()).or_default() += 1;

        let hang = self.hanging.lock().unwrap().contains(&server);
        if hang {
            std::future::pending::<()>().await;
        }
        if self.healthy.lock().unwrap().contains(&server) {
            ProbeOutcome::healthy(Some(5))
        } else {
            ProbeOutcome::unhealthy(None, "Connection error: refused")
        }
    }
}

/// Acquirer handing out a fixed endpoint, or failing when it has none.
pub struct CountingAcquirer {
    next: Option<UpstreamEndpoint>,
    pub calls: AtomicUsize,
}

impl CountingAcquirer {
    pub fn returning(endpoint: UpstreamEndpoint) -> Self {
        Self { next: Some(endpoint), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { next: None, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Acquire for CountingAcquirer {
    async fn fetch(&self, provider: &ProviderConfig) -> Result<UpstreamEndpoint, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next.clone().ok_or_else(|| AcquisitionError::Exhausted {
            provider: provider.id.clone(),
            attempts: 1,
            last: Box::new(AcquisitionError::Provider("no proxy available".into())),
        })
    }
}

/// Everything wired with in-process doubles.
pub struct Harness {
    pub live: Arc<LiveConfig>,
    pub history: Arc<MemoryHistory>,
    pub store: Arc<RecordingStore>,
    pub applier: Arc<SwitchableApplier>,
    pub acquirer: Arc<CountingAcquirer>,
    pub probe: Arc<ScriptedProbe>,
    pub failover: Arc<FailoverCoordinator>,
    pub monitor: PortMonitor,
}

pub fn harness(
    config: RelayConfig,
    probe: ScriptedProbe,
    applier: SwitchableApplier,
    acquirer: CountingAcquirer,
) -> Harness {
    let live = Arc::new(LiveConfig::new(config));
    let history = Arc::new(MemoryHistory::default());
    let store = Arc::new(RecordingStore::default());
    let applier = Arc::new(applier);
    let acquirer = Arc::new(acquirer);
    let probe = Arc::new(probe);

    let failover = Arc::new(FailoverCoordinator::new(
        live.clone(),
        store.clone(),
        applier.clone(),
        history.clone(),
        acquirer.clone(),
    ));
    let monitor = PortMonitor::new(live.clone(), probe.clone(), failover.clone(), history.clone())
        .with_error_backoff(Duration::from_secs(10));

    Harness {
        live,
        history,
        store,
        applier,
        acquirer,
        probe,
        failover,
        monitor,
    }
}

impl RecordingStore {
    /// Latest saved document; panics if nothing was saved.
    pub fn load_latest(&self) -> RelayConfig {
        self.saved.lock().unwrap().last().cloned().expect("nothing saved")
    }
}
