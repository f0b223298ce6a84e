//! Strike policy: what to do after a classified failure.
//!
//! The policy is a pure function of the strike configuration, the failure's
//! [`ErrorInfo`] and the attempt number, so it can be tested without time.

use std::time::Duration;

use super::backoff::{fibonacci_delay, scale_delay};
use crate::error::{ErrorCategory, ErrorInfo};

/// Configuration for the three-strike protocol.
#[derive(Clone, Debug, PartialEq)]
pub struct StrikeConfig {
    /// Strike budget: the attempt at which the handler escalates.
    pub max_retries: u32,
    /// Wait after a rate-limit failure on strike 1.
    pub rate_limit_delay: Duration,
    /// Wait after a rate-limit failure on strike 2 and later.
    pub extended_rate_limit_delay: Duration,
    /// Multiplier applied to every wait. 0.0 disables waiting.
    pub delay_scale: f64,
}

impl Default for StrikeConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_delay: Duration::from_secs(60),
            extended_rate_limit_delay: Duration::from_secs(120),
            delay_scale: 1.0,
        }
    }
}

impl StrikeConfig {
    /// Creates a new StrikeConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the strike budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the strike-1 rate-limit wait.
    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    /// Sets the strike-2 rate-limit wait.
    pub fn with_extended_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.extended_rate_limit_delay = delay;
        self
    }

    /// Sets the wait multiplier.
    pub fn with_delay_scale(mut self, scale: f64) -> Self {
        self.delay_scale = scale;
        self
    }

    /// Decides the next step after attempt `attempt` failed with `info`.
    ///
    /// Fatal categories escalate on any strike. Reaching the strike budget
    /// escalates. Otherwise strike 1 waits the rate-limit delay or
    /// `fibonacci_delay(1)`, and later strikes wait the extended rate-limit
    /// delay or `fibonacci_delay(attempt)`.
    pub fn decide(&self, info: &ErrorInfo, attempt: u32) -> StrikeDecision {
        if info.is_fatal() {
            return StrikeDecision::Escalate {
                reason: format!("{} error cannot be recovered by retrying", info.category),
            };
        }
        if attempt >= self.max_retries.max(1) {
            return StrikeDecision::Escalate {
                reason: format!("strike budget of {} attempts exhausted", self.max_retries),
            };
        }

        let (delay, reason) = match (attempt, info.category) {
            (1, ErrorCategory::RateLimit) => (self.rate_limit_delay, "rate limit backoff"),
            (1, _) => (fibonacci_delay(1), "simple retry after transient error"),
            (_, ErrorCategory::RateLimit) => {
                (self.extended_rate_limit_delay, "extended rate limit backoff")
            }
            (n, _) => (fibonacci_delay(n), "retry after repeated transient error"),
        };

        let delay = scale_delay(delay, self.delay_scale);
        StrikeDecision::Retry {
            delay,
            reason: format!("{} ({:.1}s)", reason, delay.as_secs_f64()),
        }
    }
}

/// Outcome of applying the strike policy to one failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrikeDecision {
    /// Wait `delay`, then make another attempt.
    Retry {
        /// How long to wait.
        delay: Duration,
        /// Recovery step taken, for the escalation report.
        reason: String,
    },
    /// Stop retrying: notify and return the original error.
    Escalate {
        /// Why the handler gave up.
        reason: String,
    },
}

impl StrikeDecision {
    /// Returns true for `Escalate`.
    pub fn is_escalate(&self) -> bool {
        matches!(self, StrikeDecision::Escalate { .. })
    }

    /// Returns the wait for `Retry`, `None` for `Escalate`.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            StrikeDecision::Retry { delay, .. } => Some(*delay),
            StrikeDecision::Escalate { .. } => None,
        }
    }
}
