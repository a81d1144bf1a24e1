//! Top-level error type for relay operations.

use thiserror::Error;

use crate::acquisition::AcquisitionError;
use crate::config::ConfigError;
use crate::engine::ApplyError;
use crate::history::StoreError;

/// Errors surfaced by monitor control and failover.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing binding or provider, invalid reason, bad setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("switch on port {port} failed: {reason} (rolled back: {rolled_back})")]
    Switch {
        port: u16,
        reason: String,
        rolled_back: bool,
    },

    /// Engine apply outside a switch, e.g. the initial push at startup.
    #[error("engine apply failed: {0}")]
    Apply(#[from] ApplyError),

    /// Monitor already running, or a lifecycle race.
    #[error("concurrency error: {0}")]
    Concurrency(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RelayResult<T> = Result<T, RelayError>;
