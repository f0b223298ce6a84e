//! Circuit breaker for a protected dependency.
//!
//! Implements the circuit breaker pattern to stop issuing calls to a
//! dependency that keeps failing. The circuit has three states:
//!
//! - **Closed**: normal operation, requests are allowed through.
//! - **Open**: the dependency is failing, requests fail fast.
//! - **HalfOpen**: the cooldown elapsed and a single trial call is in flight.
//!
//! State lives behind a `std::sync::Mutex` that is only held for the
//! synchronous decision, never across an `.await`. The half-open trial slot
//! is claimed inside `allow_request()` itself, so two concurrent callers can
//! never both be admitted as the trial call.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ErrorInfo;

/// Default number of consecutive failures before opening the circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time to wait before admitting a half-open trial call.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Dependency is failing - requests are rejected.
    Open,
    /// Cooldown elapsed - one trial call is allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait after opening before admitting a trial call.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a configuration from a threshold and a cooldown in seconds.
    pub fn new(failure_threshold: u32, cooldown_seconds: f64) -> Self {
        let cooldown = if cooldown_seconds.is_finite() && cooldown_seconds > 0.0 {
            Duration::from_secs_f64(cooldown_seconds)
        } else {
            Duration::ZERO
        };
        Self {
            failure_threshold,
            cooldown,
        }
    }
}

/// Point-in-time view of a breaker, for diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CircuitStatus {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures since the last reset.
    pub consecutive_failures: u32,
    /// Successes recorded over the breaker's lifetime.
    pub total_successes: u64,
    /// Failures recorded over the breaker's lifetime.
    pub total_failures: u64,
    /// Configured failure threshold.
    pub failure_threshold: u32,
    /// Time left before a trial call is admitted; only set while open.
    pub cooldown_remaining: Option<Duration>,
    /// Message of the most recently recorded failure, if known.
    pub last_failure: Option<String>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    total_successes: u64,
    total_failures: u64,
    opened_at: Option<Instant>,
    trial_claimed_at: Option<Instant>,
    last_failure: Option<String>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            total_successes: 0,
            total_failures: 0,
            opened_at: None,
            trial_claimed_at: None,
            last_failure: None,
        }
    }
}

/// Circuit breaker guarding one logical dependency.
///
/// Thread-safe; share it between handlers with an `Arc`.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings (5 failures, 60s).
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            config,
        }
    }

    /// Create a circuit breaker from a threshold and a cooldown in seconds.
    pub fn with_threshold(failure_threshold: u32, cooldown_seconds: f64) -> Self {
        Self::with_config(CircuitBreakerConfig::new(failure_threshold, cooldown_seconds))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn threshold(&self) -> u32 {
        self.config.failure_threshold.max(1)
    }

    /// Lock the state, recovering from poison.
    ///
    /// No critical section can leave the state half-written, so a poisoned
    /// lock still guards a consistent value.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Decides whether a new attempt may proceed.
    ///
    /// - Closed: always true.
    /// - Open: false until the cooldown has elapsed; then the breaker moves
    ///   to HalfOpen and this caller is admitted as the trial call.
    /// - HalfOpen: false while the trial call is outstanding. A trial claim older
    ///   than one cooldown is treated as abandoned and may be re-claimed.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .map_or(true, |opened| now.duration_since(opened) >= self.config.cooldown);
                if cooled {
                    info!(
                        consecutive_failures = inner.consecutive_failures,
                        "circuit breaker half-open, admitting trial call"
                    );
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_claimed_at = Some(now);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                let abandoned = inner
                    .trial_claimed_at
                    .map_or(true, |claimed| now.duration_since(claimed) >= self.config.cooldown);
                if abandoned {
                    debug!("half-open trial call abandoned, admitting a new trial call");
                    inner.trial_claimed_at = Some(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records a successful attempt.
    ///
    /// Closed: resets the failure count. HalfOpen: closes the circuit.
    /// Open: the success came from a call admitted before the circuit opened
    /// and does not change state.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.total_successes += 1;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                info!("circuit breaker closed after successful trial call");
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.trial_claimed_at = None;
                inner.last_failure = None;
            }
            CircuitState::Open => {
                debug!("success recorded while circuit open, state unchanged");
            }
        }
    }

    /// Records a failed attempt.
    ///
    /// Closed: increments the failure count and opens the circuit at the
    /// threshold. HalfOpen: the trial call failed, the circuit reopens and the
    /// cooldown restarts. Open: counts the failure, the cooldown is kept.
    pub fn record_failure(&self) {
        self.record(None);
    }

    /// Records a failed attempt along with its classification.
    pub fn record_failure_with(&self, info: &ErrorInfo) {
        self.record(Some(info.message.clone()));
    }

    fn record(&self, message: Option<String>) {
        let threshold = self.threshold();
        let mut inner = self.lock();
        let now = Instant::now();
        inner.total_failures += 1;
        if message.is_some() {
            inner.last_failure = message;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= threshold {
                    warn!(
                        consecutive_failures = inner.consecutive_failures,
                        threshold, "circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                } else {
                    debug!(
                        consecutive_failures = inner.consecutive_failures,
                        threshold, "circuit breaker recorded failure"
                    );
                }
            }
            CircuitState::HalfOpen => {
                warn!("half-open trial call failed, circuit breaker reopened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.trial_claimed_at = None;
            }
            CircuitState::Open => {
                inner.consecutive_failures += 1;
                debug!(
                    consecutive_failures = inner.consecutive_failures,
                    "failure recorded while circuit open"
                );
            }
        }
    }

    /// Returns the current state without triggering any transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Returns true while the circuit is open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns the number of consecutive failures.
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Time left before the next trial call is admitted, while open.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let inner = self.lock();
        self.remaining(&inner)
    }

    fn remaining(&self, inner: &Inner) -> Option<Duration> {
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened)) => {
                Some(self.config.cooldown.saturating_sub(opened.elapsed()))
            }
            _ => None,
        }
    }

    /// Returns a snapshot of the breaker.
    pub fn status(&self) -> CircuitStatus {
        let inner = self.lock();
        CircuitStatus {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            failure_threshold: self.config.failure_threshold,
            cooldown_remaining: self.remaining(&inner),
            last_failure: inner.last_failure.clone(),
        }
    }

    /// Resets the breaker to its initial Closed state.
    pub fn reset(&self) {
        info!("circuit breaker manually reset");
        *self.lock() = Inner::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use std::sync::Arc;

    fn breaker(threshold: u32, cooldown_secs: u64) -> CircuitBreaker {
        CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_secs(cooldown_secs),
        })
    }

    #[test]
    fn test_defaults() {
        let cb = CircuitBreaker::new();
        assert_eq!(cb.config().failure_threshold, 5);
        assert_eq!(cb.config().cooldown, Duration::from_secs(60));
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.is_open());
        assert!(cb.allow_request());
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = breaker(5, 60);
        for _ in 0..4 {
            cb.record_failure();
            assert!(cb.allow_request());
        }
        cb.record_failure();
        assert!(cb.is_open());
        assert_eq!(cb.consecutive_failures(), 5);
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_success_resets_failures_when_closed() {
        let cb = breaker(3, 60);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.consecutive_failures(), 0);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_exactly_one_trial_call() {
        let cb = breaker(2, 60);
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.allow_request());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!cb.allow_request());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.allow_request());
        assert!(!cb.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_call_success_closes_circuit() {
        let cb = breaker(2, 10);
        cb.record_failure();
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(cb.allow_request());
        cb.record_success();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
        for _ in 0..10 {
            assert!(cb.allow_request());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_call_failure_reopens_and_restarts_cooldown() {
        let cb = breaker(2, 10);
        cb.record_failure();
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(cb.allow_request());
        cb.record_failure();
        assert!(cb.is_open());
        assert_eq!(cb.consecutive_failures(), 2);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!cb.allow_request());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_call_can_be_reclaimed() {
        let cb = breaker(1, 5);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.allow_request());

        // the trial call never reports back
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!cb.allow_request());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_while_open_does_not_reset() {
        let cb = breaker(1, 30);
        cb.record_failure();
        cb.record_success();
        assert!(cb.is_open());
        assert_eq!(cb.consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_snapshot() {
        let cb = breaker(2, 30);
        cb.record_success();
        cb.record_failure_with(&ErrorInfo::new(ErrorCategory::Api, "HTTP 502: bad gateway"));
        cb.record_failure();

        tokio::time::advance(Duration::from_secs(10)).await;
        let status = cb.status();
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(status.consecutive_failures, 2);
        assert_eq!(status.total_successes, 1);
        assert_eq!(status.total_failures, 2);
        assert_eq!(status.failure_threshold, 2);
        assert_eq!(status.cooldown_remaining, Some(Duration::from_secs(20)));
        assert_eq!(status.last_failure.as_deref(), Some("HTTP 502: bad gateway"));
    }

    #[test]
    fn test_reset() {
        let cb = breaker(1, 60);
        cb.record_failure();
        assert!(cb.is_open());
        cb.reset();
        assert_eq!(cb.status().state, CircuitState::Closed);
        assert_eq!(cb.status().total_failures, 0);
        assert!(cb.allow_request());
    }

    #[test]
    fn test_zero_threshold_behaves_like_one() {
        let cb = breaker(0, 60);
        assert!(cb.allow_request());
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn test_config_from_seconds() {
        let config = CircuitBreakerConfig::new(3, 1.5);
        assert_eq!(config.cooldown, Duration::from_millis(1500));
        assert_eq!(CircuitBreakerConfig::new(3, f64::NAN).cooldown, Duration::ZERO);
    }

    #[test]
    fn test_shared_across_threads() {
        let cb = Arc::new(breaker(100, 60));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cb = Arc::clone(&cb);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        cb.record_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cb.consecutive_failures(), 40);
    }
}
