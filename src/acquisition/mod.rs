//! Upstream acquisition subsystem.
//!
//! # Data Flow
//! ```text
//! ProviderConfig
//!     → client.rs (GET/POST with headers, params, body, timeout)
//!     → resilience::retries (retry_attempts, backoff_base)
//!     → schema.rs (strategy chosen by response_format.type)
//!         - FixedCodeFormat: numeric code + list at data_path
//!         - GenericFormat: success flag + object at data_path
//!     → path.rs (dotted-path extraction)
//!     → UpstreamEndpoint
//! ```
//!
//! # Design Decisions
//! - No state is kept between fetches
//! - Schema errors are retried like transport errors; the provider may recover
//! - The final error keeps the last underlying cause reachable via `root()`

pub mod client;
pub mod path;
pub mod schema;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::upstream::UpstreamEndpoint;

pub use client::AcquisitionClient;
pub use path::extract_path;
pub use schema::ResponseSchema;

/// Errors raised while acquiring a replacement upstream.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The provider did not answer within its timeout.
    #[error("request timed out after {secs} seconds")]
    Timeout { secs: u64 },

    /// Transport failure or non-success HTTP status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The response did not have the configured shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// The provider answered, but reported failure or had nothing to give.
    #[error("provider error: {0}")]
    Provider(String),

    /// Every attempt failed; `last` is the final cause.
    #[error("provider '{provider}' failed after {attempts} attempt(s): {last}")]
    Exhausted {
        provider: String,
        attempts: u32,
        #[source]
        last: Box<AcquisitionError>,
    },
}

impl AcquisitionError {
    /// The underlying cause, unwrapping retry aggregation.
    pub fn root(&self) -> &AcquisitionError {
        match self {
            AcquisitionError::Exhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

/// Source of replacement upstream endpoints.
#[async_trait]
pub trait Acquire: Send + Sync {
    async fn fetch(&self, provider: &ProviderConfig) -> Result<UpstreamEndpoint, AcquisitionError>;
}
