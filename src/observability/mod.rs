//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Monitor loops, failover coordinator, acquisition client produce:
//!     → logging.rs (structured log events, `port` / `provider` fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap and recorded even when no exporter is installed

pub mod logging;
pub mod metrics;
