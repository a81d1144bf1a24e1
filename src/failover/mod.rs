//! Failover subsystem.
//!
//! # Data Flow
//! ```text
//! monitor threshold reached / manual request
//!     → coordinator.rs (per-port lock)
//!     → acquisition (new upstream from the binding's provider)
//!     → ConfigStore::save → ConfigApplier::apply → LiveConfig swap
//!     → HistoryStore::append_switch
//! ```
//!
//! # Design Decisions
//! - The live snapshot only changes after the new document is durable and applied
//! - A failed apply restores the previous document before the error is returned
//! - At most one switch per port is in flight

pub mod coordinator;

pub use coordinator::FailoverCoordinator;
