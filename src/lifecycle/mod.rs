//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Restore history → Wire subsystems
//!     → Apply engine config → Start monitors → Watch config file
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop monitors → Save history → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then monitors
//! - Each monitor has its own `Shutdown`; stopping one port never touches another
//! - Monitor stop has a bounded wait; shutdown never hangs on a stuck probe

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::Relay;
