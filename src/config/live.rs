//! Live configuration snapshot.
//!
//! # Responsibilities
//! - Hold the working set of bindings and providers in memory
//! - Hand out complete, immutable snapshots to readers
//! - Publish mutations as whole new snapshots
//!
//! # Design Decisions
//! - `ArcSwap` gives lock-free reads; a reader never sees a half-updated binding
//! - Writers go through `rcu` so concurrent updates to different ports are not lost
//! - File reloads and `begin_write` share a gate, so a reload either lands
//!   before a switch takes its snapshot or is deferred until the switch ends

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::schema::{PortBinding, ProviderConfig, RelayConfig};
use crate::upstream::UpstreamEndpoint;

/// Shared, atomically swappable configuration.
#[derive(Debug)]
pub struct LiveConfig {
    inner: ArcSwap<RelayConfig>,
    writers: AtomicUsize,
    reload_gate: Mutex<()>,
}

/// What [`LiveConfig::reload_with`] did with the loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A writer is active; nothing was loaded.
    Deferred,
    Unchanged,
    Replaced,
}

/// Held while a writer has the on-disk document out of step with the
/// live snapshot. See [`LiveConfig::begin_write`].
#[derive(Debug)]
pub struct WriteGuard<'a> {
    live: &'a LiveConfig,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.live.writers.fetch_sub(1, Ordering::AcqRel);
    }
}

impl LiveConfig {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            inner: ArcSwap::from_pointee(config),
            writers: AtomicUsize::new(0),
            reload_gate: Mutex::new(()),
        }
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.reload_gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<RelayConfig> {
        self.inner.load_full()
    }

    pub fn binding(&self, local_port: u16) -> Option<PortBinding> {
        self.inner.load().binding(local_port).cloned()
    }

    pub fn provider(&self, id: &str) -> Option<ProviderConfig> {
        self.inner.load().provider(id).cloned()
    }

    /// Mark the start of a save/apply cycle. File reloads are suppressed
    /// until every guard is dropped.
    pub fn begin_write(&self) -> WriteGuard<'_> {
        // Waits out a reload that is already past its writer check.
        let _gate = self.gate();
        self.writers.fetch_add(1, Ordering::AcqRel);
        WriteGuard { live: self }
    }

    pub fn is_writing(&self) -> bool {
        self.writers.load(Ordering::Acquire) > 0
    }

    /// Replace the whole working set.
    pub fn replace(&self, config: RelayConfig) {
        self.inner.store(Arc::new(config));
    }

    /// Publish the document returned by `load` unless a writer is active
    /// or it equals the current snapshot. No writer can begin while
    /// `load` runs.
    pub fn reload_with<E>(
        &self,
        load: impl FnOnce() -> Result<RelayConfig, E>,
    ) -> Result<ReloadOutcome, E> {
        let _gate = self.gate();
        if self.is_writing() {
            return Ok(ReloadOutcome::Deferred);
        }
        let config = load()?;
        if **self.inner.load() == config {
            return Ok(ReloadOutcome::Unchanged);
        }
        self.replace(config);
        Ok(ReloadOutcome::Replaced)
    }

    /// Point `local_port` at `upstream`.
    ///
    /// Returns the new snapshot, or `None` if the port has no binding.
    pub fn set_upstream(
        &self,
        local_port: u16,
        upstream: Option<UpstreamEndpoint>,
    ) -> Option<Arc<RelayConfig>> {
        self.inner.load().binding(local_port)?;
        self.inner.rcu(|current| {
            let mut next = RelayConfig::clone(current);
            if let Some(binding) = next.binding_mut(local_port) {
                binding.upstream = upstream.clone();
            }
            Arc::new(next)
        });
        Some(self.inner.load_full())
    }
}
