//! Retry metrics collection.
//!
//! This module counts what the strike handler does across calls: attempts,
//! retries, escalations, circuit rejections and the categories of the
//! failures it has seen. A [`StrikeMetrics`] handle is cheap to clone and all
//! clones share the same counters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::error::ErrorCategory;

/// Aggregated counters, as captured by [`StrikeMetrics::snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Calls to `execute_with_retry`, including rejected ones.
    pub calls: u64,
    /// Calls that returned a value.
    pub successes: u64,
    /// Failed attempts across all calls.
    pub failed_attempts: u64,
    /// Backoff waits started.
    pub retries: u64,
    /// Calls that ended in escalation.
    pub escalations: u64,
    /// Calls rejected by an open circuit.
    pub circuit_rejections: u64,
    /// Calls cancelled during a backoff wait.
    pub cancellations: u64,
    /// Total time spent in backoff waits, in seconds.
    pub total_backoff_secs: f64,
    /// Failed attempts by category.
    pub error_frequency: HashMap<ErrorCategory, u64>,
}

impl MetricsSnapshot {
    /// Fraction of calls that returned a value.
    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.successes as f64 / self.calls as f64
    }

    /// The category seen most often, if any failure was recorded.
    ///
    /// Ties are broken by the category's declaration order.
    pub fn most_common_error(&self) -> Option<ErrorCategory> {
        ErrorCategory::ALL
            .into_iter()
            .filter_map(|c| self.error_frequency.get(&c).map(|n| (c, *n)))
            .filter(|(_, n)| *n > 0)
            .fold(None, |best: Option<(ErrorCategory, u64)>, (c, n)| match best {
                Some((_, best_n)) if best_n >= n => best,
                _ => Some((c, n)),
            })
            .map(|(c, _)| c)
    }

    /// Total time spent in backoff waits.
    pub fn total_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.total_backoff_secs).unwrap_or_default()
    }
}

/// Thread-safe metrics collector shared by strike handlers.
#[derive(Debug, Clone, Default)]
pub struct StrikeMetrics {
    inner: Arc<RwLock<MetricsSnapshot>>,
}

impl StrikeMetrics {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> RwLockWriteGuard<'_, MetricsSnapshot> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, MetricsSnapshot> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn record_call(&self) {
        self.write().calls += 1;
    }

    pub(crate) fn record_success(&self) {
        self.write().successes += 1;
    }

    pub(crate) fn record_failure(&self, category: ErrorCategory) {
        let mut m = self.write();
        m.failed_attempts += 1;
        *m.error_frequency.entry(category).or_insert(0) += 1;
    }

    pub(crate) fn record_retry(&self, delay: Duration) {
        let mut m = self.write();
        m.retries += 1;
        m.total_backoff_secs += delay.as_secs_f64();
    }

    pub(crate) fn record_escalation(&self) {
        self.write().escalations += 1;
    }

    pub(crate) fn record_circuit_rejection(&self) {
        self.write().circuit_rejections += 1;
    }

    pub(crate) fn record_cancellation(&self) {
        self.write().cancellations += 1;
    }

    /// Returns a copy of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.read().clone()
    }

    /// Clears all counters.
    pub fn reset(&self) {
        *self.write() = MetricsSnapshot::default();
    }
}
