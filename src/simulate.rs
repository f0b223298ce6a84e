//! Synthetic failing operations for exercising a [`StrikeHandler`].
//!
//! Used by the `strikeguard simulate` command to show how the handler treats
//! each error category without calling a real dependency.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::breaker::CircuitStatus;
use crate::error::{ErrorCategory, HttpStatusError};
use crate::metrics::MetricsSnapshot;
use crate::strike::{Context, StrikeError, StrikeHandler};

/// A failure produced by a simulated operation.
///
/// Each variant wraps an error the classifier recognizes by type, so the
/// simulated category is recovered through the normal classification path.
#[derive(Debug, Error)]
pub enum SimulatedError {
    /// An I/O failure.
    #[error("simulated failure: {0}")]
    Io(#[source] io::Error),

    /// An HTTP-style status failure.
    #[error("simulated failure: {0}")]
    Http(#[source] HttpStatusError),

    /// A failure with no recognizable shape.
    #[error("simulated failure")]
    Opaque,
}

impl SimulatedError {
    /// Builds an error that classifies as `category`.
    pub fn for_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Network => Self::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
            ErrorCategory::Timeout => {
                Self::Io(io::Error::new(io::ErrorKind::TimedOut, "operation timed out"))
            }
            ErrorCategory::Resource => {
                Self::Io(io::Error::new(io::ErrorKind::NotFound, "input file missing"))
            }
            ErrorCategory::RateLimit => Self::Http(HttpStatusError::new(429, "Too Many Requests")),
            ErrorCategory::Auth => Self::Http(HttpStatusError::new(401, "Unauthorized")),
            ErrorCategory::Validation => {
                Self::Http(HttpStatusError::new(422, "Unprocessable Entity"))
            }
            ErrorCategory::Api => Self::Http(HttpStatusError::new(503, "Service Unavailable")),
            ErrorCategory::Unknown => Self::Opaque,
        }
    }
}

/// How a simulated call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The operation eventually returned a value.
    Success,
    /// The handler gave up and returned the operation's error.
    Escalated,
    /// The breaker rejected the call.
    CircuitOpen,
    /// The call was cancelled during a wait.
    Cancelled,
}

/// Result of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Requested failure category.
    pub category: ErrorCategory,
    /// Failures the operation was scripted to produce.
    pub scripted_failures: u32,
    /// Times the operation was invoked.
    pub attempts: u32,
    /// How the call ended.
    pub outcome: Outcome,
    /// Final error text, if the call failed.
    pub error: Option<String>,
    /// Handler metrics after the run.
    pub metrics: MetricsSnapshot,
    /// Breaker state after the run.
    pub breaker: CircuitStatus,
}

/// Runs an operation through `handler` that fails `failures` times with
/// `category` and then succeeds.
pub async fn run_simulation(
    handler: &StrikeHandler,
    category: ErrorCategory,
    failures: u32,
) -> SimulationReport {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let mut context = Context::new();
    context.insert("simulation".to_string(), category.to_string());

    let result = handler
        .execute_with_retry(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < failures {
                        Err(SimulatedError::for_category(category))
                    } else {
                        Ok(())
                    }
                }
            },
            context,
        )
        .await;

    let (outcome, error) = match result {
        Ok(()) => (Outcome::Success, None),
        Err(err @ StrikeError::CircuitOpen { .. }) => (Outcome::CircuitOpen, Some(err.to_string())),
        Err(err @ StrikeError::Cancelled) => (Outcome::Cancelled, Some(err.to_string())),
        Err(err @ StrikeError::Operation(_)) => (Outcome::Escalated, Some(err.to_string())),
    };

    SimulationReport {
        category,
        scripted_failures: failures,
        attempts: calls.load(Ordering::SeqCst),
        outcome,
        error,
        metrics: handler.metrics().snapshot(),
        breaker: handler.circuit_breaker().status(),
    }
}
