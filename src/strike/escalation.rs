//! Escalation: the terminal action once the strike budget is spent.
//!
//! An [`Escalation`] implementation is notified with the failure's
//! [`ErrorInfo`] and the caller's context. Independently of any callback, the
//! handler emits an [`EscalationReport`] as a `tracing` event at target
//! `strikeguard::escalation`, which is where log and telemetry sinks subscribe.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use super::{Context, RetryContext};
use crate::error::{ErrorCategory, ErrorInfo, ErrorSeverity};

/// Target of the escalation report event.
pub const ESCALATION_TARGET: &str = "strikeguard::escalation";

/// Errors raised by an escalation callback. They are logged and swallowed.
#[derive(Debug, Error)]
pub enum EscalationError {
    /// The callback reported a failure.
    #[error("escalation handler failed: {0}")]
    Handler(String),

    /// The callback hit an I/O error while notifying.
    #[error("escalation I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EscalationError {
    /// Creates a handler error from anything displayable.
    pub fn handler(message: impl std::fmt::Display) -> Self {
        Self::Handler(message.to_string())
    }
}

/// Callback invoked when the handler gives up on an operation.
#[async_trait]
pub trait Escalation: Send + Sync {
    /// Notifies about an escalated failure.
    async fn escalate(&self, info: &ErrorInfo, context: &Context) -> Result<(), EscalationError>;
}

/// Adapter turning an async closure into an [`Escalation`].
///
/// ```ignore
/// let handler = StrikeHandler::new().with_escalation(FnEscalation::new(|info, ctx| async move {
///     alert(&info, &ctx).await;
///     Ok(())
/// }));
/// ```
pub struct FnEscalation<F>(F);

impl<F> FnEscalation<F> {
    /// Wraps a closure.
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(ErrorInfo, Context) -> Fut + Send + Sync,
        Fut: Future<Output = Result<(), EscalationError>> + Send,
    {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Escalation for FnEscalation<F>
where
    F: Fn(ErrorInfo, Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), EscalationError>> + Send,
{
    async fn escalate(&self, info: &ErrorInfo, context: &Context) -> Result<(), EscalationError> {
        (self.0)(info.clone(), context.clone()).await
    }
}

/// Detailed diagnostic report for an escalated failure.
#[derive(Clone, Debug, Serialize)]
pub struct EscalationReport {
    /// Rust type name of the original error.
    pub error_type: String,
    /// Display text of the original error.
    pub error_message: String,
    /// Category of the final failure.
    pub category: ErrorCategory,
    /// Severity of the final failure.
    pub severity: ErrorSeverity,
    /// Number of attempts made, including the last one.
    pub attempts_made: u32,
    /// Recovery steps taken before giving up.
    pub recovery_steps: Vec<String>,
    /// Time spent in the retry sequence.
    pub elapsed_secs: f64,
    /// When the escalation happened.
    pub timestamp: DateTime<Utc>,
    /// Suggested follow-up actions.
    pub recommendations: Vec<String>,
    /// The caller's context.
    pub context: Context,
}

impl EscalationReport {
    /// Builds a report from the original error and the retry state.
    pub fn new<E: std::error::Error + 'static>(
        error: &E,
        info: &ErrorInfo,
        retry: &RetryContext,
    ) -> Self {
        Self {
            error_type: std::any::type_name::<E>().to_string(),
            error_message: error.to_string(),
            category: info.category,
            severity: info.severity,
            attempts_made: retry.attempt,
            recovery_steps: retry.recovery_steps.clone(),
            elapsed_secs: retry.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
            recommendations: recommendations(info.category),
            context: retry.context.clone(),
        }
    }

    /// Time spent in the retry sequence.
    pub fn elapsed(&self) -> Duration {
        Duration::try_from_secs_f64(self.elapsed_secs).unwrap_or_default()
    }

    /// Emits the report as a tracing event.
    pub fn emit(&self) {
        let context = serde_json::to_string(&self.context).unwrap_or_default();
        let report = serde_json::to_string(self).unwrap_or_default();
        error!(
            target: ESCALATION_TARGET,
            category = %self.category,
            severity = %self.severity,
            attempts = self.attempts_made,
            message = %self.error_message,
            context = %context,
            report = %report,
            "escalating {} failure after {} attempt(s)",
            self.category,
            self.attempts_made
        );
    }
}

/// Returns follow-up actions for a failure category.
pub fn recommendations(category: ErrorCategory) -> Vec<String> {
    let items: &[&str] = match category {
        ErrorCategory::Auth => &[
            "Verify API key or credentials are valid",
            "Check if credentials have expired",
            "Ensure proper permissions are granted",
        ],
        ErrorCategory::RateLimit => &[
            "Queue requests behind a client-side rate limiter",
            "Consider a higher API tier for larger limits",
            "Cache responses to reduce API calls",
        ],
        ErrorCategory::Network | ErrorCategory::Timeout => &[
            "Check network connectivity",
            "Verify DNS resolution",
            "Check if the target service is reachable",
        ],
        ErrorCategory::Validation => &[
            "Review the input data format",
            "Check the API documentation for schema changes",
            "Validate data before sending",
        ],
        ErrorCategory::Resource => &[
            "Verify file paths exist",
            "Check available disk space and memory",
            "Review file permissions",
        ],
        ErrorCategory::Api | ErrorCategory::Unknown => &[
            "Review the error chain for the root cause",
            "Check recent changes to the calling code",
            "Check the provider's status page",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}
