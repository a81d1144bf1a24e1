//! Retry logic.
//!
//! # Responsibilities
//! - Execute an operation, retrying every failure up to a fixed budget
//! - Sleep with exponential backoff between attempts
//! - Report the last failure once the budget is spent

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::resilience::backoff::calculate_backoff;

/// How often, and how patiently, to retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub retries: u32,
    /// Base of the exponential backoff, in seconds.
    pub backoff_base: f64,
}

/// All attempts failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: E,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff_base: f64) -> Self {
        Self { retries, backoff_base }
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.backoff_base)
    }

    /// Run `op` until it succeeds or `retries + 1` attempts have failed.
    ///
    /// `op` receives the 0-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let total = self.retries + 1;
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.delay_before(attempt);
                tracing::info!(attempt, retries = self.retries, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
                tokio::time::sleep(delay).await;
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, total, error = %e, "Attempt failed");
                    if attempt >= self.retries {
                        return Err(RetryExhausted { attempts: attempt + 1, last: e });
                    }
                }
            }
            attempt += 1;
        }
    }
}
