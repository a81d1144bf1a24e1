//! Upstream replacement with apply and rollback.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::acquisition::Acquire;
use crate::config::schema::RelayConfig;
use crate::config::{ConfigStore, LiveConfig};
use crate::engine::ConfigApplier;
use crate::error::{RelayError, RelayResult};
use crate::history::{HistoryStore, SwitchReason, SwitchRecord};
use crate::observability::metrics;
use crate::upstream::UpstreamEndpoint;

/// Replaces the upstream bound to a local port.
pub struct FailoverCoordinator {
    live: Arc<LiveConfig>,
    store: Arc<dyn ConfigStore>,
    applier: Arc<dyn ConfigApplier>,
    history: Arc<dyn HistoryStore>,
    acquirer: Arc<dyn Acquire>,
    port_locks: DashMap<u16, Arc<Mutex<()>>>,
    /// Serializes document writes; switches on different ports still
    /// rewrite the same file.
    apply_lock: Mutex<()>,
}

impl FailoverCoordinator {
    pub fn new(
        live: Arc<LiveConfig>,
        store: Arc<dyn ConfigStore>,
        applier: Arc<dyn ConfigApplier>,
        history: Arc<dyn HistoryStore>,
        acquirer: Arc<dyn Acquire>,
    ) -> Self {
        Self {
            live,
            store,
            applier,
            history,
            acquirer,
            port_locks: DashMap::new(),
            apply_lock: Mutex::new(()),
        }
    }

    pub fn live(&self) -> &Arc<LiveConfig> {
        &self.live
    }

    /// Point `local_port` at `new_upstream`.
    ///
    /// On failure the previous upstream stays in effect and a failed
    /// record is appended.
    pub async fn switch(
        &self,
        local_port: u16,
        new_upstream: UpstreamEndpoint,
        reason: SwitchReason,
    ) -> RelayResult<SwitchRecord> {
        let lock = self.port_lock(local_port);
        let _guard = lock.lock().await;
        self.switch_locked(local_port, new_upstream, reason).await
    }

    /// [`switch`](Self::switch) with a reason given as text, e.g. from an
    /// admin request.
    pub async fn switch_with_reason(
        &self,
        local_port: u16,
        new_upstream: UpstreamEndpoint,
        reason: &str,
    ) -> RelayResult<SwitchRecord> {
        let reason = reason.parse::<SwitchReason>()?;
        self.switch(local_port, new_upstream, reason).await
    }

    /// Fetch a fresh upstream from an enabled provider.
    pub async fn get_new_upstream(&self, provider_id: &str) -> RelayResult<UpstreamEndpoint> {
        let provider = self
            .live
            .provider(provider_id)
            .ok_or_else(|| RelayError::Configuration(format!("provider '{}' not found", provider_id)))?;
        if !provider.enabled {
            return Err(RelayError::Configuration(format!("provider '{}' is disabled", provider_id)));
        }
        Ok(self.acquirer.fetch(&provider).await?)
    }

    /// Acquire from the binding's provider and switch, holding the port
    /// lock throughout.
    pub async fn failover(&self, local_port: u16, reason: SwitchReason) -> RelayResult<SwitchRecord> {
        let lock = self.port_lock(local_port);
        let _guard = lock.lock().await;

        let binding = self
            .live
            .binding(local_port)
            .ok_or_else(|| RelayError::Configuration(format!("no binding for port {}", local_port)))?;
        let provider_id = binding.provider.ok_or_else(|| {
            RelayError::Configuration(format!("port {} has no acquisition provider", local_port))
        })?;

        tracing::info!(port = local_port, provider = %provider_id, reason = %reason, "Starting failover");
        let new_upstream = self.get_new_upstream(&provider_id).await?;
        self.switch_locked(local_port, new_upstream, reason).await
    }

    fn port_lock(&self, local_port: u16) -> Arc<Mutex<()>> {
        self.port_locks
            .entry(local_port)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn switch_locked(
        &self,
        local_port: u16,
        new_upstream: UpstreamEndpoint,
        reason: SwitchReason,
    ) -> RelayResult<SwitchRecord> {
        let _apply = self.apply_lock.lock().await;
        let _writing = self.live.begin_write();

        let current = self.live.snapshot();
        let mut next = RelayConfig::clone(&current);
        let binding = next
            .binding_mut(local_port)
            .ok_or_else(|| RelayError::Configuration(format!("no binding for port {}", local_port)))?;
        let old_upstream = binding.upstream.replace(new_upstream.clone());

        tracing::info!(
            port = local_port,
            old = ?old_upstream.as_ref().map(|u| u.to_string()),
            new = %new_upstream,
            reason = %reason,
            "Switching upstream"
        );

        match self.commit(&next).await {
            Ok(()) => {
                self.live.set_upstream(local_port, Some(new_upstream.clone()));
                let record = self.record(SwitchRecord::new(local_port, old_upstream, new_upstream, reason, true));
                metrics::record_switch(local_port, reason.as_str(), true);
                tracing::info!(port = local_port, "Upstream switched");
                Ok(record)
            }
            Err(cause) => {
                tracing::error!(port = local_port, error = %cause, "Switch failed, rolling back");
                let rolled_back = self.rollback(local_port, &current).await;
                self.record(SwitchRecord::new(local_port, old_upstream, new_upstream, reason, false));
                metrics::record_switch(local_port, reason.as_str(), false);
                Err(RelayError::Switch {
                    port: local_port,
                    reason: cause,
                    rolled_back,
                })
            }
        }
    }

    async fn commit(&self, config: &RelayConfig) -> Result<(), String> {
        self.store
            .save(config)
            .map_err(|e| format!("failed to persist configuration: {}", e))?;
        let rendered = self.applier.render(config);
        self.applier
            .apply(&rendered)
            .await
            .map_err(|e| format!("failed to apply engine configuration: {}", e))
    }

    /// Best effort; failures are logged, never raised.
    async fn rollback(&self, local_port: u16, previous: &RelayConfig) -> bool {
        let mut ok = true;
        if let Err(e) = self.store.save(previous) {
            tracing::error!(port = local_port, error = %e, alert = true, "Rollback could not restore saved configuration");
            ok = false;
        }
        let rendered = self.applier.render(previous);
        if let Err(e) = self.applier.apply(&rendered).await {
            tracing::error!(port = local_port, error = %e, alert = true, "Rollback could not re-apply engine configuration");
            ok = false;
        }
        ok
    }

    fn record(&self, record: SwitchRecord) -> SwitchRecord {
        match self.history.append_switch(record.clone()) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(port = record.local_port, error = %e, "Failed to record switch");
                record
            }
        }
    }
}
