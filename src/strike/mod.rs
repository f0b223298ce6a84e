//! Three-strike retry protocol.
//!
//! This module wraps calls to an unreliable dependency. Every failure is
//! classified, counted against a shared circuit breaker, and run through the
//! strike policy:
//!
//! - **Strike 1**: fatal errors escalate at once; rate limits wait the
//!   rate-limit delay; everything else waits `fibonacci_delay(1)`.
//! - **Strike 2**: rate limits wait the extended delay; fatal errors
//!   escalate; transient errors wait `fibonacci_delay(2)`.
//! - **Strike 3**: the escalation callback runs, a report is emitted, and
//!   the original error is returned unchanged.

pub mod backoff;
pub mod escalation;
pub mod handler;
pub mod policy;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ErrorInfo;

pub use backoff::{fibonacci_delay, BACKOFF_CAP};
pub use escalation::{Escalation, EscalationError, EscalationReport, FnEscalation};
pub use handler::{retry_with_backoff, StrikeHandler};
pub use policy::{StrikeConfig, StrikeDecision};

/// Caller-supplied diagnostic context, e.g. a task identifier.
pub type Context = HashMap<String, String>;

/// Per-call retry state.
///
/// Created when a call enters the handler and discarded when it returns.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based once the first attempt starts).
    pub attempt: u32,
    /// The caller's context.
    pub context: Context,
    /// Classification of the most recent failure.
    pub last_error: Option<ErrorInfo>,
    /// Recovery steps taken so far.
    pub recovery_steps: Vec<String>,
    started: Instant,
}

impl RetryContext {
    /// Creates the state for a new call.
    pub fn new(context: Context) -> Self {
        Self {
            attempt: 0,
            context,
            last_error: None,
            recovery_steps: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Records a recovery step.
    pub fn record_step(&mut self, step: impl Into<String>) {
        self.recovery_steps.push(step.into());
    }

    /// Time since the call entered the handler.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Error returned by [`StrikeHandler::execute_with_retry`].
///
/// `Operation` carries the protected operation's own error, untouched. The
/// other variants are synthetic and never produced by the operation.
#[derive(Debug)]
pub enum StrikeError<E> {
    /// The circuit breaker rejected the call; the operation was not invoked.
    CircuitOpen {
        /// Consecutive failures recorded by the breaker.
        consecutive_failures: u32,
        /// Time left before the breaker admits a trial call.
        cooldown_remaining: Duration,
    },
    /// The caller cancelled the call during a backoff wait.
    Cancelled,
    /// The operation failed and the handler gave up.
    Operation(E),
}

impl<E> StrikeError<E> {
    /// Returns true if the breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, StrikeError::CircuitOpen { .. })
    }

    /// Returns true if the call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StrikeError::Cancelled)
    }

    /// Borrows the operation's error, if that is what ended the call.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            StrikeError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Takes the operation's error, if that is what ended the call.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            StrikeError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for StrikeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrikeError::CircuitOpen {
                consecutive_failures,
                cooldown_remaining,
            } => write!(
                f,
                "circuit breaker is open after {} consecutive failures; retry in {:.1}s",
                consecutive_failures,
                cooldown_remaining.as_secs_f64()
            ),
            StrikeError::Cancelled => write!(f, "retry sequence cancelled"),
            StrikeError::Operation(e) => e.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for StrikeError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StrikeError::Operation(e) => e.source(),
            _ => None,
        }
    }
}
