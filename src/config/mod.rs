//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated)
//!     → live.rs (ArcSwap snapshot shared by monitor and failover)
//!
//! On switch:
//!     failover coordinator publishes a new snapshot
//!     → loader.rs saves the whole document back (TomlConfigStore)
//!
//! On external edit:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the live snapshot
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; changes publish a new snapshot
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod live;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use live::{LiveConfig, ReloadOutcome, WriteGuard};
pub use loader::{ConfigError, ConfigStore, TomlConfigStore};
pub use schema::{
    EngineConfig, FixedCodeFormat, GenericFormat, HttpMethod, MonitoringConfig, PortBinding,
    ProviderConfig, RelayConfig, ResponseFormat,
};
