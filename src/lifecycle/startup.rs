//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated configuration
//! - Restore audit history
//! - Push the initial engine configuration
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in dependency order, not concurrently
//! - Monitors start last, after the engine has the current bindings

use notify::RecommendedWatcher;
use std::path::PathBuf;
use std::sync::Arc;

use crate::acquisition::AcquisitionClient;
use crate::config::watcher::ConfigWatcher;
use crate::config::{LiveConfig, RelayConfig, TomlConfigStore};
use crate::engine::{ConfigApplier, SingBoxApplier};
use crate::error::RelayResult;
use crate::failover::FailoverCoordinator;
use crate::health::{HttpProbe, PortMonitor};
use crate::history::MemoryHistory;

/// Fully wired relay.
pub struct Relay {
    pub live: Arc<LiveConfig>,
    pub history: Arc<MemoryHistory>,
    pub applier: Arc<SingBoxApplier>,
    pub failover: Arc<FailoverCoordinator>,
    pub monitor: Arc<PortMonitor>,
    config_path: PathBuf,
}

impl Relay {
    /// Wire subsystems around `config`, which was loaded from `config_path`.
    pub fn bootstrap(config_path: impl Into<PathBuf>, config: RelayConfig) -> RelayResult<Self> {
        let config_path = config_path.into();

        let history = match &config.history.path {
            Some(path) => MemoryHistory::load_from_file(path)?,
            None => MemoryHistory::new(None),
        };
        let history = Arc::new(history);

        let applier = Arc::new(SingBoxApplier::from_config(&config.engine));
        let acquirer = AcquisitionClient::new()?;
        let live = Arc::new(LiveConfig::new(config));

        let failover = Arc::new(FailoverCoordinator::new(
            live.clone(),
            Arc::new(TomlConfigStore::new(&config_path)),
            applier.clone(),
            history.clone(),
            Arc::new(acquirer),
        ));
        let monitor = Arc::new(PortMonitor::new(
            live.clone(),
            Arc::new(HttpProbe::new()),
            failover.clone(),
            history.clone(),
        ));

        tracing::info!(path = %config_path.display(), "Relay initialized");
        Ok(Self {
            live,
            history,
            applier,
            failover,
            monitor,
            config_path,
        })
    }

    /// Render the live snapshot and apply it to the engine.
    pub async fn apply_current(&self) -> RelayResult<()> {
        let rendered = self.applier.render(&self.live.snapshot());
        self.applier.apply(&rendered).await?;
        Ok(())
    }

    /// Start hot reload of the config file. Keep the watcher alive.
    pub fn watch_config(&self) -> Result<RecommendedWatcher, notify::Error> {
        ConfigWatcher::new(&self.config_path, self.live.clone()).run()
    }

    /// Stop every monitor and persist history.
    pub async fn shutdown(&self) -> RelayResult<()> {
        self.monitor.stop_all().await;
        self.history.save_to_file()?;
        Ok(())
    }
}
