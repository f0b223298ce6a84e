//! Concrete error shapes raised by wrapped dependencies.
//!
//! These are the error types the classifier recognizes by type before it
//! falls back to message heuristics. `AgentClientError` models the failures
//! of an agent CLI client; `HttpStatusError` is the generic carrier for any
//! dependency that reports an HTTP-style status code.

use thiserror::Error;

/// Errors raised by the agent CLI client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentClientError {
    /// The client executable could not be located.
    #[error("agent CLI not found: {0}")]
    CliNotFound(String),

    /// The client process exited unsuccessfully.
    #[error("agent process failed (exit code {exit_code:?}): {stderr}")]
    Process {
        /// Exit code, when the process exited normally.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The client produced output that is not valid JSON.
    #[error("failed to decode agent output: {0}")]
    JsonDecode(String),
}

impl AgentClientError {
    /// Convenience constructor for a failed process.
    pub fn process(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::Process {
            exit_code,
            stderr: stderr.into(),
        }
    }
}

/// An error carrying an HTTP-style status code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("HTTP {status}: {message}")]
pub struct HttpStatusError {
    /// The status code returned by the dependency.
    pub status: u16,
    /// The response body or reason phrase.
    pub message: String,
}

impl HttpStatusError {
    /// Creates a new status error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
