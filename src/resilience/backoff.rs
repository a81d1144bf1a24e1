//! Exponential backoff.

use std::time::Duration;

/// Longest single backoff sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Delay before retry number `attempt` (1-based): `base^(attempt-1)` seconds.
///
/// Attempt 0 is the initial try and never waits.
pub fn calculate_backoff(attempt: u32, base: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let secs = base.powi(exponent);
    if !secs.is_finite() || secs < 0.0 || secs >= MAX_BACKOFF.as_secs_f64() {
        return MAX_BACKOFF;
    }

    Duration::from_secs_f64(secs)
}
