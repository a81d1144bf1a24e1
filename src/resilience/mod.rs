//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to acquisition provider:
//!     → per-request timeout (provider config)
//!     → On failure: retries.rs (retry up to retry_attempts more times)
//!     → backoff.rs (sleep backoff_base^(attempt-1) seconds before each retry)
//!     → After the last attempt: surface the last cause
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Every failure is retried uniformly; callers decide what counts as failure
//! - Backoff is deterministic so operators can reason about worst-case latency

pub mod backoff;
pub mod retries;

pub use retries::{RetryExhausted, RetryPolicy};
