//! Health monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! Per-port loop (monitor.rs):
//!     Read latest binding from LiveConfig
//!     → probe.rs (GET check_url through the upstream)
//!     → update state.rs, append probe log
//!     → threshold reached → FailoverCoordinator::failover
//!
//! Registry (monitor.rs):
//!     start / stop / get_status under one lock
//! ```
//!
//! # Design Decisions
//! - One task per monitored port; ports never wait on each other
//! - Probing happens outside the registry lock
//! - The loop only exits through `stop`

pub mod monitor;
pub mod probe;
pub mod state;

pub use monitor::PortMonitor;
pub use probe::{HealthProbe, HttpProbe, ProbeOutcome};
pub use state::MonitorState;
