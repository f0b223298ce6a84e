//! Error classification types for the three-strike protocol
//!
//! This module provides the closed taxonomy that every failure of a protected
//! operation is mapped into. Errors are classified by category (network,
//! timeout, rate limit, auth, validation, api, resource, unknown), each
//! category carries a default severity, and fatal categories are never retried.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The primary category of an error, determining which strike policy applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection-level failures (DNS, TCP, TLS, unreachable hosts).
    Network,
    /// The operation or request exceeded its time limit.
    Timeout,
    /// The dependency asked us to slow down (HTTP 429 or equivalent).
    RateLimit,
    /// Invalid, expired, or insufficient credentials.
    Auth,
    /// Malformed input or output; retrying the same shape cannot succeed.
    Validation,
    /// The remote API failed on its side (HTTP 5xx or a failed process).
    Api,
    /// Local resources: files, disk, memory.
    Resource,
    /// Nothing recognized the error.
    Unknown,
}

impl ErrorCategory {
    /// All categories, in declaration order.
    pub const ALL: [ErrorCategory; 8] = [
        ErrorCategory::Network,
        ErrorCategory::Timeout,
        ErrorCategory::RateLimit,
        ErrorCategory::Auth,
        ErrorCategory::Validation,
        ErrorCategory::Api,
        ErrorCategory::Resource,
        ErrorCategory::Unknown,
    ];

    /// Returns the severity assigned to this category when nothing more
    /// specific is known.
    pub fn default_severity(self) -> ErrorSeverity {
        match self {
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::RateLimit => {
                ErrorSeverity::Low
            }
            ErrorCategory::Auth => ErrorSeverity::High,
            ErrorCategory::Validation
            | ErrorCategory::Api
            | ErrorCategory::Resource
            | ErrorCategory::Unknown => ErrorSeverity::Medium,
        }
    }

    /// Returns true for categories where a retry cannot plausibly succeed.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorCategory::Auth | ErrorCategory::Validation)
    }

    /// Returns true for categories eligible for a retry.
    pub fn is_retryable(self) -> bool {
        !self.is_fatal()
    }

    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Api => "api",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ErrorCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| format!("unknown error category: {}", s))
    }
}

/// How urgently an error needs attention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Transient, likely recoverable.
    Low,
    /// May need intervention.
    Medium,
    /// Needs escalation.
    High,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Low => f.write_str("low"),
            ErrorSeverity::Medium => f.write_str("medium"),
            ErrorSeverity::High => f.write_str("high"),
        }
    }
}

/// The result of classifying one failure.
///
/// Produced fresh per classification call and consumed immediately by the
/// strike handler and the escalation callback. The message is always the
/// original error's own description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// The category of the error.
    pub category: ErrorCategory,
    /// The severity of the error.
    pub severity: ErrorSeverity,
    /// Human-readable message taken from the original error.
    pub message: String,
    /// Suggested wait before the next attempt, when the source provides one.
    #[serde(default, with = "optional_secs")]
    pub retry_after: Option<Duration>,
}

impl ErrorInfo {
    /// Creates an error info with the category's default severity.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            severity: category.default_severity(),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Overrides the severity.
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Attaches a retry-after hint.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Returns true if this error must not be retried.
    pub fn is_fatal(&self) -> bool {
        self.category.is_fatal()
    }

    /// Returns true if this error may resolve on retry.
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.category, self.severity, self.message)
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}
