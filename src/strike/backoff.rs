//! Fibonacci backoff table used between strikes.

use std::time::Duration;

/// Upper bound on any fibonacci backoff wait.
pub const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Seconds to wait after attempts 1 through 6.
const FIBONACCI_TABLE: [u64; 6] = [1, 1, 2, 3, 5, 8];

/// Returns the backoff wait after the given attempt (1-based).
///
/// Attempts 1 through 6 follow the fibonacci sequence `1, 1, 2, 3, 5, 8`
/// seconds. From attempt 7 onward the wait is capped at 30 seconds; the
/// sequence values 13 and 21 are skipped. Attempt 0 is
/// treated as attempt 1.
pub fn fibonacci_delay(attempt: u32) -> Duration {
    let index = attempt.max(1) as usize - 1;
    FIBONACCI_TABLE
        .get(index)
        .map_or(BACKOFF_CAP, |secs| Duration::from_secs(*secs))
}

/// Scales a delay by a non-negative factor.
///
/// Factors that are negative, NaN or infinite leave the delay unchanged.
pub fn scale_delay(delay: Duration, factor: f64) -> Duration {
    if !factor.is_finite() || factor < 0.0 || factor == 1.0 {
        return delay;
    }
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
}
