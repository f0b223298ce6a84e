//! The strike handler: runs an operation under the three-strike protocol.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::escalation::{Escalation, EscalationReport};
use super::policy::{StrikeConfig, StrikeDecision};
use super::{Context, RetryContext, StrikeError};
use crate::breaker::CircuitBreaker;
use crate::error::{default_classifier, ErrorClassifier, ErrorInfo};
use crate::metrics::StrikeMetrics;

/// Orchestrates attempts, backoff waits, the circuit breaker and escalation.
///
/// A handler is meant to be long-lived and shared by every call site that
/// protects the same dependency, so that they share one circuit breaker.
/// Cloning a handler shares the breaker, the escalation callback and the
/// metrics.
#[derive(Clone)]
pub struct StrikeHandler {
    config: StrikeConfig,
    breaker: Arc<CircuitBreaker>,
    escalation: Option<Arc<dyn Escalation>>,
    classifier: Option<Arc<ErrorClassifier>>,
    metrics: StrikeMetrics,
}

impl Default for StrikeHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StrikeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrikeHandler")
            .field("config", &self.config)
            .field("breaker", &self.breaker.status())
            .field("escalation", &self.escalation.is_some())
            .finish_non_exhaustive()
    }
}

impl StrikeHandler {
    /// Creates a handler with the default strike budget (3), no escalation
    /// callback and a default circuit breaker.
    pub fn new() -> Self {
        Self::with_config(StrikeConfig::default())
    }

    /// Creates a handler with the given strike configuration.
    pub fn with_config(config: StrikeConfig) -> Self {
        Self {
            config,
            breaker: Arc::new(CircuitBreaker::new()),
            escalation: None,
            classifier: None,
            metrics: StrikeMetrics::new(),
        }
    }

    /// Sets the strike budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Sets the escalation callback.
    pub fn with_escalation(mut self, escalation: impl Escalation + 'static) -> Self {
        self.escalation = Some(Arc::new(escalation));
        self
    }

    /// Uses a shared circuit breaker.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    /// Uses a custom classifier instead of the process-wide default.
    pub fn with_classifier(mut self, classifier: Arc<ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Records into the given metrics collector.
    pub fn with_metrics(mut self, metrics: StrikeMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the strike configuration.
    pub fn config(&self) -> &StrikeConfig {
        &self.config
    }

    /// Returns the circuit breaker.
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &StrikeMetrics {
        &self.metrics
    }

    /// Applies the strike policy to a failure on attempt `attempt`.
    pub fn decide(&self, info: &ErrorInfo, attempt: u32) -> StrikeDecision {
        self.config.decide(info, attempt)
    }

    fn classifier(&self) -> &ErrorClassifier {
        self.classifier
            .as_deref()
            .unwrap_or_else(|| default_classifier())
    }

    /// Runs `operation` under the three-strike protocol.
    ///
    /// Returns the first successful result. Returns
    /// [`StrikeError::CircuitOpen`] without invoking the operation when the
    /// breaker rejects the call, and [`StrikeError::Operation`] with the
    /// original error once the handler escalates.
    ///
    /// The operation must be safe to invoke more than once.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        context: Context,
    ) -> Result<T, StrikeError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        self.run(operation, context, None).await
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), but a backoff
    /// wait ends early with [`StrikeError::Cancelled`] when `cancel` fires.
    /// No further attempt and no escalation happen after cancellation.
    pub async fn execute_with_retry_cancellable<T, E, F, Fut>(
        &self,
        operation: F,
        context: Context,
        cancel: &CancellationToken,
    ) -> Result<T, StrikeError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        self.run(operation, context, Some(cancel)).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        context: Context,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, StrikeError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        self.metrics.record_call();

        if !self.breaker.allow_request() {
            let status = self.breaker.status();
            self.metrics.record_circuit_rejection();
            warn!(
                consecutive_failures = status.consecutive_failures,
                context = ?context,
                "circuit breaker open, rejecting call"
            );
            return Err(StrikeError::CircuitOpen {
                consecutive_failures: status.consecutive_failures,
                cooldown_remaining: status.cooldown_remaining.unwrap_or_default(),
            });
        }

        let mut retry = RetryContext::new(context);
        loop {
            retry.attempt += 1;

            let error = match operation().await {
                Ok(value) => {
                    self.breaker.record_success();
                    self.metrics.record_success();
                    if retry.attempt > 1 {
                        info!(attempts = retry.attempt, "operation recovered");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let info = self.classifier().classify(&error);
            self.breaker.record_failure_with(&info);
            self.metrics.record_failure(info.category);

            match self.decide(&info, retry.attempt) {
                StrikeDecision::Retry { delay, reason } => {
                    warn!(
                        attempt = retry.attempt,
                        max_retries = self.config.max_retries,
                        category = %info.category,
                        severity = %info.severity,
                        error = %info.message,
                        "strike {}: {}",
                        retry.attempt,
                        reason
                    );
                    retry.record_step(reason);
                    retry.last_error = Some(info);
                    self.metrics.record_retry(delay);

                    if !wait(delay, cancel).await {
                        self.metrics.record_cancellation();
                        info!(attempt = retry.attempt, "retry sequence cancelled");
                        return Err(StrikeError::Cancelled);
                    }
                }
                StrikeDecision::Escalate { reason } => {
                    retry.record_step(reason);
                    retry.last_error = Some(info.clone());
                    self.escalate(&error, &info, &retry).await;
                    return Err(StrikeError::Operation(error));
                }
            }
        }
    }

    async fn escalate<E: StdError + 'static>(
        &self,
        error: &E,
        info: &ErrorInfo,
        retry: &RetryContext,
    ) {
        self.metrics.record_escalation();

        if let Some(escalation) = &self.escalation {
            if let Err(err) = escalation.escalate(info, &retry.context).await {
                warn!(error = %err, "escalation callback failed");
            }
        }

        EscalationReport::new(error, info, retry).emit();
    }
}

/// Sleeps for `delay`. Returns false if `cancel` fired first.
async fn wait(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    let Some(token) = cancel else {
        if !delay.is_zero() {
            debug!(delay_secs = delay.as_secs_f64(), "backing off");
            tokio::time::sleep(delay).await;
        }
        return true;
    };

    if token.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }

    debug!(delay_secs = delay.as_secs_f64(), "backing off");
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Runs `operation` with a fresh default handler and no escalation callback.
///
/// The circuit breaker is created per call, so no breaker state carries over
/// between calls.
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation: F,
    max_retries: u32,
) -> Result<T, StrikeError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: StdError + 'static,
{
    StrikeHandler::new()
        .with_max_retries(max_retries)
        .execute_with_retry(operation, Context::new())
        .await
}
