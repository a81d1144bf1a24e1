//! Upstream endpoint subsystem.
//!
//! # Data Flow
//! ```text
//! config file / acquisition provider / manual input
//!     → endpoint.rs (typed UpstreamEndpoint)
//!     → PortBinding.upstream (replaced wholesale on switch)
//!     → health probe dial URL, engine outbound rendering
//! ```
//!
//! # Design Decisions
//! - One variant per protocol; SOCKS5 and HTTP(S) share a shape
//! - VLESS fields are required by construction, not validated afterwards

pub mod endpoint;

pub use endpoint::{ProxyServer, UpstreamEndpoint, VlessServer, VlessTls, VlessTransport};
