//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use crate::config::live::{LiveConfig, ReloadOutcome};
use crate::config::loader::load_config;

/// A watcher that swaps edited configuration files into the live snapshot.
pub struct ConfigWatcher {
    path: PathBuf,
    live: Arc<LiveConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    pub fn new(path: &Path, live: Arc<LiveConfig>) -> Self {
        Self {
            path: path.to_path_buf(),
            live,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let live = self.live.clone();
        let path = self.path.clone();

        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    let ours = event.paths.iter().any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if ours && (event.kind.is_modify() || event.kind.is_create()) {
                        reload(&path, &live);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        // Saves replace the file by rename, so watch the directory.
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load `path` and publish it if it differs from the live snapshot.
///
/// Returns whether a new snapshot was published.
pub fn reload(path: &Path, live: &LiveConfig) -> bool {
    match live.reload_with(|| load_config(path)) {
        Ok(ReloadOutcome::Replaced) => {
            let config = live.snapshot();
            tracing::info!(ports = config.ports.len(), providers = config.providers.len(), "Config file change detected, reloaded");
            true
        }
        // Our own saves land here too.
        Ok(ReloadOutcome::Unchanged) => false,
        Ok(ReloadOutcome::Deferred) => {
            tracing::debug!("Switch in progress, skipping config reload");
            false
        }
        Err(e) => {
            tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
            false
        }
    }
}
