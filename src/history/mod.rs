//! Audit history subsystem.
//!
//! # Data Flow
//! ```text
//! failover coordinator → append_switch (SwitchRecord, write-once)
//! monitor loop         → append_probe_log, upsert_monitor_state
//! admin surface        → query_switch_history, query_monitor_states
//! ```
//!
//! # Design Decisions
//! - Records are never mutated after append
//! - Failing to record history never fails the operation being recorded

pub mod memory;
pub mod records;

use thiserror::Error;

use crate::health::state::MonitorState;

pub use memory::MemoryHistory;
pub use records::{ProbeLogEntry, SwitchReason, SwitchRecord};

/// Errors raised by history persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Audit trail of switches, probes and monitor states.
pub trait HistoryStore: Send + Sync {
    /// Append a switch record; the store assigns its id.
    fn append_switch(&self, record: SwitchRecord) -> Result<SwitchRecord, StoreError>;

    fn append_probe_log(&self, entry: ProbeLogEntry) -> Result<(), StoreError>;

    fn upsert_monitor_state(&self, state: &MonitorState) -> Result<(), StoreError>;

    /// Newest first.
    fn query_switch_history(&self, local_port: Option<u16>, limit: usize, offset: usize) -> Vec<SwitchRecord>;

    /// Newest first.
    fn query_probe_logs(&self, local_port: Option<u16>, limit: usize) -> Vec<ProbeLogEntry>;

    fn query_monitor_states(&self) -> Vec<MonitorState>;
}
