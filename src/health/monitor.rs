//! Per-port health monitor.
//!
//! # Responsibilities
//! - Own one probe loop per monitored port
//! - Count consecutive failures and trigger failover at the threshold
//! - Publish `MonitorState` snapshots and probe logs after each cycle

use chrono::Utc;
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::config::LiveConfig;
use crate::error::{RelayError, RelayResult};
use crate::failover::FailoverCoordinator;
use crate::health::probe::HealthProbe;
use crate::health::state::MonitorState;
use crate::history::{HistoryStore, ProbeLogEntry, SwitchReason};
use crate::lifecycle::shutdown::{triggered, Shutdown};
use crate::observability::metrics;

/// Pause after a cycle that errored or panicked.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// How long `stop` waits for a loop to exit.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct MonitorHandle {
    generation: u64,
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    handles: HashMap<u16, MonitorHandle>,
    states: BTreeMap<u16, MonitorState>,
}

struct Shared {
    live: Arc<LiveConfig>,
    probe: Arc<dyn HealthProbe>,
    failover: Arc<FailoverCoordinator>,
    history: Arc<dyn HistoryStore>,
    registry: Mutex<Registry>,
}

/// Starts, stops and reports on per-port monitor loops.
pub struct PortMonitor {
    shared: Arc<Shared>,
    generations: AtomicU64,
    error_backoff: Duration,
}

impl PortMonitor {
    pub fn new(
        live: Arc<LiveConfig>,
        probe: Arc<dyn HealthProbe>,
        failover: Arc<FailoverCoordinator>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                live,
                probe,
                failover,
                history,
                registry: Mutex::new(Registry::default()),
            }),
            generations: AtomicU64::new(0),
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Launch the probe loop for `local_port`.
    pub async fn start(&self, local_port: u16) -> RelayResult<()> {
        let binding = self
            .shared
            .live
            .binding(local_port)
            .ok_or_else(|| RelayError::Configuration(format!("no binding for port {}", local_port)))?;

        let mut registry = self.shared.registry.lock().await;
        if registry.handles.contains_key(&local_port) {
            return Err(RelayError::Concurrency(format!(
                "monitor for port {} already running",
                local_port
            )));
        }

        let state = MonitorState::started(local_port, binding.upstream);
        self.shared.persist(&state);
        registry.states.insert(local_port, state.clone());

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let shutdown = Shutdown::new();
        let task = tokio::spawn(run_loop(
            self.shared.clone(),
            generation,
            state,
            shutdown.subscribe(),
            self.error_backoff,
        ));
        registry.handles.insert(
            local_port,
            MonitorHandle {
                generation,
                shutdown,
                task,
            },
        );

        tracing::info!(port = local_port, "Monitoring started");
        Ok(())
    }

    /// Cancel the loop for `local_port` and mark it disabled.
    pub async fn stop(&self, local_port: u16) -> RelayResult<()> {
        let mut handle = {
            let mut registry = self.shared.registry.lock().await;
            registry.handles.remove(&local_port).ok_or_else(|| {
                RelayError::Concurrency(format!("monitor for port {} not running", local_port))
            })?
        };

        handle.shutdown.trigger();
        match tokio::time::timeout(STOP_TIMEOUT, &mut handle.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(port = local_port, error = %e, "Monitor task ended abnormally"),
            Err(_) => {
                tracing::warn!(port = local_port, "Monitor did not exit within {}s, proceeding", STOP_TIMEOUT.as_secs());
                // An in-flight failover runs in its own task and still completes.
                handle.task.abort();
            }
        }

        let mut registry = self.shared.registry.lock().await;
        // A concurrent start owns the state now.
        if !registry.handles.contains_key(&local_port) {
            if let Some(state) = registry.states.get_mut(&local_port) {
                state.enabled = false;
                self.shared.persist(state);
            }
        }

        tracing::info!(port = local_port, "Monitoring stopped");
        Ok(())
    }

    pub async fn is_running(&self, local_port: u16) -> bool {
        self.shared.registry.lock().await.handles.contains_key(&local_port)
    }

    /// Snapshot of every known monitor, keyed by port.
    pub async fn get_status(&self) -> BTreeMap<u16, MonitorState> {
        let mut states = self.shared.registry.lock().await.states.clone();
        let config = self.shared.live.snapshot();
        for (port, state) in states.iter_mut() {
            if let Some(binding) = config.binding(*port) {
                state.current_upstream = binding.upstream.clone();
            }
        }
        states
    }

    /// Start every binding with monitoring on and an upstream. Returns the
    /// ports that started.
    pub async fn start_enabled(&self) -> Vec<u16> {
        let config = self.shared.live.snapshot();
        let mut started = Vec::new();
        for binding in config.ports.iter().filter(|b| b.monitoring && b.upstream.is_some()) {
            match self.start(binding.local_port).await {
                Ok(()) => started.push(binding.local_port),
                Err(e) => tracing::warn!(port = binding.local_port, error = %e, "Could not start monitor"),
            }
        }
        started
    }

    pub async fn stop_all(&self) {
        let ports: Vec<u16> = self.shared.registry.lock().await.handles.keys().copied().collect();
        for result in join_all(ports.iter().map(|port| self.stop(*port))).await {
            if let Err(e) = result {
                tracing::debug!(error = %e, "Monitor already stopped");
            }
        }
    }
}

impl Shared {
    fn persist(&self, state: &MonitorState) {
        if let Err(e) = self.history.upsert_monitor_state(state) {
            tracing::warn!(port = state.local_port, error = %e, "Failed to persist monitor state");
        }
    }

    /// Publish `state` unless the loop that produced it has been replaced.
    async fn publish(&self, generation: u64, state: &MonitorState) {
        let mut registry = self.registry.lock().await;
        let current = registry.handles.get(&state.local_port).map(|h| h.generation);
        if current != Some(generation) {
            return;
        }
        registry.states.insert(state.local_port, state.clone());
        drop(registry);
        self.persist(state);
    }

    async fn run_cycle(&self, state: &mut MonitorState) -> RelayResult<()> {
        let port = state.local_port;
        let config = self.live.snapshot();
        let binding = config
            .binding(port)
            .ok_or_else(|| RelayError::Configuration(format!("no binding for port {}", port)))?;

        state.current_upstream = binding.upstream.clone();
        let Some(upstream) = binding.upstream.clone() else {
            tracing::debug!(port, "Direct mode, nothing to probe");
            return Ok(());
        };

        let monitoring = &config.monitoring;
        let outcome = self
            .probe
            .check(&upstream, &monitoring.check_url, monitoring.check_timeout())
            .await;
        let now = Utc::now();

        metrics::record_probe(port, outcome.healthy, outcome.latency_ms);
        if let Err(e) = self.history.append_probe_log(ProbeLogEntry {
            local_port: port,
            upstream: upstream.clone(),
            healthy: outcome.healthy,
            latency_ms: outcome.latency_ms,
            message: outcome.message.clone(),
            timestamp: now,
        }) {
            tracing::warn!(port, error = %e, "Failed to append probe log");
        }

        if outcome.healthy {
            tracing::debug!(port, upstream = %upstream, latency_ms = ?outcome.latency_ms, "Probe succeeded");
            state.record_success(now);
        } else {
            let failures = state.record_failure(now);
            tracing::warn!(
                port,
                upstream = %upstream,
                failures,
                threshold = monitoring.failure_threshold,
                error = outcome.message.as_deref().unwrap_or("unknown"),
                "Probe failed"
            );

            if failures >= monitoring.failure_threshold {
                // Own task: aborting this loop must not cut a commit short.
                let failover = self.failover.clone();
                let attempt = tokio::spawn(async move {
                    failover.failover(port, SwitchReason::HealthCheckFailed).await
                });
                match attempt.await {
                    Ok(Ok(record)) => {
                        tracing::info!(port, new = %record.new_upstream, "Failover completed")
                    }
                    Ok(Err(e)) => tracing::error!(port, error = %e, "Failover failed"),
                    Err(e) => tracing::error!(port, error = %e, "Failover task ended abnormally"),
                }
                // Reset regardless of outcome so a broken provider is not hammered every cycle.
                state.failure_count = 0;
                state.current_upstream = self.live.binding(port).and_then(|b| b.upstream);
            }
        }

        metrics::record_failure_count(port, state.failure_count);
        Ok(())
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    generation: u64,
    mut state: MonitorState,
    mut shutdown: broadcast::Receiver<()>,
    error_backoff: Duration,
) {
    let port = state.local_port;
    loop {
        if triggered(&mut shutdown) {
            break;
        }

        let cycle = AssertUnwindSafe(shared.run_cycle(&mut state)).catch_unwind().await;
        let pause = match cycle {
            Ok(Ok(())) => shared.live.snapshot().monitoring.check_interval(),
            Ok(Err(e)) => {
                tracing::error!(port, error = %e, "Monitor cycle failed");
                error_backoff
            }
            Err(_) => {
                tracing::error!(port, "Monitor cycle panicked");
                error_backoff
            }
        };

        shared.publish(generation, &state).await;

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!(port, "Monitor loop exited");
}
