//! Downstream proxy engine subsystem.
//!
//! # Data Flow
//! ```text
//! RelayConfig snapshot
//!     → render.rs (one inbound, outbound and route rule per port)
//!     → singbox.rs (backup, write, reload; restore on failure)
//! ```
//!
//! # Design Decisions
//! - The engine is an external collaborator behind `ConfigApplier`
//! - Rendering is a pure function of the snapshot

pub mod render;
pub mod singbox;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::schema::RelayConfig;

pub use render::render_engine_config;
pub use singbox::SingBoxApplier;

/// Errors raised while applying a rendered configuration.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("engine config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine config serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("engine reload failed: {0}")]
    Reload(String),
}

/// Pushes bindings to the engine that actually forwards traffic.
#[async_trait]
pub trait ConfigApplier: Send + Sync {
    fn render(&self, config: &RelayConfig) -> Value {
        render_engine_config(config)
    }

    /// Install `rendered` and make the engine pick it up. On failure the
    /// previously applied document must be back in place.
    async fn apply(&self, rendered: &Value) -> Result<(), ApplyError>;
}
