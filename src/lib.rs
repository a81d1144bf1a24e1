//! Health-driven upstream failover for local proxy ports.
//!
//! Each local port is bound to an upstream proxy. A monitor per port
//! probes the upstream through itself; after enough consecutive failures
//! the failover coordinator acquires a replacement from the port's
//! provider, persists it, pushes it to the proxy engine, and rolls back
//! if the engine rejects it.

// Core subsystems
pub mod acquisition;
pub mod config;
pub mod engine;
pub mod failover;
pub mod health;
pub mod history;
pub mod upstream;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use lifecycle::{Relay, Shutdown};
