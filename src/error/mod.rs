//! Error classification module
//!
//! This module maps failures of a protected operation into a closed taxonomy
//! of categories and severities. The strike handler consults the resulting
//! [`ErrorInfo`] to decide between retrying, backing off, and escalating.

pub mod classification;
pub mod detector;
pub mod sources;

// Re-export main types for convenient access
pub use classification::{ErrorCategory, ErrorInfo, ErrorSeverity};
pub use detector::{classify, default_classifier, ErrorClassifier, ErrorPattern};
pub use sources::{AgentClientError, HttpStatusError};
