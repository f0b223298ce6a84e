//! Error classifier for failures of protected operations
//!
//! This module maps an arbitrary `std::error::Error` into an [`ErrorInfo`].
//! Recognition walks the error's source chain and inspects each link by type
//! in a fixed priority order: vendor client errors, network/timeout shapes,
//! HTTP-style status codes, then filesystem/resource errors. When no link is
//! recognized, regex patterns over the error text decide, and anything left
//! over is `Unknown`.

use std::error::Error as StdError;
use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::{AgentClientError, ErrorCategory, ErrorInfo, HttpStatusError};

/// Default retry-after hint attached to rate-limit classifications.
pub const DEFAULT_RATE_LIMIT_HINT: Duration = Duration::from_secs(60);

/// A pattern for matching error text.
#[derive(Debug)]
pub struct ErrorPattern {
    /// The compiled regex pattern.
    regex: Regex,
    /// The error category to assign when this pattern matches.
    category: ErrorCategory,
    /// A human-readable description of what this pattern detects.
    description: String,
}

impl ErrorPattern {
    /// Creates a new error pattern.
    ///
    /// # Panics
    /// Panics if the regex pattern is invalid. Use [`ErrorPattern::try_new`]
    /// for patterns that come from user input.
    pub fn new(pattern: &str, category: ErrorCategory, description: impl Into<String>) -> Self {
        Self::try_new(pattern, category, description).expect("Invalid regex pattern")
    }

    /// Creates a new error pattern, returning the regex error on failure.
    pub fn try_new(
        pattern: &str,
        category: ErrorCategory,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self::with_regex(Regex::new(pattern)?, category, description))
    }

    /// Creates a new error pattern with a pre-compiled regex.
    pub fn with_regex(regex: Regex, category: ErrorCategory, description: impl Into<String>) -> Self {
        Self {
            regex,
            category,
            description: description.into(),
        }
    }

    /// Returns the regex pattern.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Returns the error category.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Checks if this pattern matches the given text.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Classifier that turns raised errors into [`ErrorInfo`] values.
///
/// Classification never fails and is deterministic: the same error always
/// yields the same `ErrorInfo`.
#[derive(Debug)]
pub struct ErrorClassifier {
    /// Text patterns consulted when no error in the chain is recognized by type.
    patterns: Vec<ErrorPattern>,
    /// Retry-after hint attached to rate-limit classifications.
    rate_limit_hint: Duration,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    /// Creates a classifier with the default text patterns.
    pub fn new() -> Self {
        Self {
            patterns: Self::default_patterns(),
            rate_limit_hint: DEFAULT_RATE_LIMIT_HINT,
        }
    }

    /// Creates a classifier with custom text patterns.
    pub fn with_patterns(patterns: Vec<ErrorPattern>) -> Self {
        Self {
            patterns,
            rate_limit_hint: DEFAULT_RATE_LIMIT_HINT,
        }
    }

    /// Sets the retry-after hint attached to rate-limit classifications.
    pub fn with_rate_limit_hint(mut self, hint: Duration) -> Self {
        self.rate_limit_hint = hint;
        self
    }

    fn default_patterns() -> Vec<ErrorPattern> {
        vec![
            ErrorPattern::new(
                r"(?i)connection|network|unreachable|\bdns\b",
                ErrorCategory::Network,
                "Network or connection failure",
            ),
            ErrorPattern::new(
                r"(?i)timed?\s*out|deadline\s+exceeded",
                ErrorCategory::Timeout,
                "Timeout",
            ),
            ErrorPattern::new(
                r"(?i)rate[\s_-]?limit|too\s+many\s+requests|\b429\b",
                ErrorCategory::RateLimit,
                "Rate limit",
            ),
            ErrorPattern::new(
                r"(?i)unauthori[sz]ed|authori[sz]|authenticat|\bauth\b|forbidden|permission\s+denied|invalid\s+(api\s+)?(key|token)|\b40[13]\b",
                ErrorCategory::Auth,
                "Authentication or authorization failure",
            ),
            ErrorPattern::new(
                r"(?i)validation|invalid|malformed|schema",
                ErrorCategory::Validation,
                "Validation failure",
            ),
            ErrorPattern::new(
                r"(?i)file\s+not\s+found|no\s+such\s+file|out\s+of\s+memory|no\s+space\s+left|\bdisk\b",
                ErrorCategory::Resource,
                "Local resource failure",
            ),
            ErrorPattern::new(
                r"(?i)\b5\d\d\b|server\s+error|\bapi\b",
                ErrorCategory::Api,
                "Remote API failure",
            ),
        ]
    }

    /// Adds a custom pattern, consulted after the existing ones.
    pub fn add_pattern(&mut self, pattern: ErrorPattern) {
        self.patterns.push(pattern);
    }

    /// Returns a reference to all configured patterns.
    pub fn patterns(&self) -> &[ErrorPattern] {
        &self.patterns
    }

    /// Classifies a raised error.
    ///
    /// Each link of the source chain is inspected by type; the first link
    /// that is recognized decides the category. Otherwise the top-level
    /// message is matched against the text patterns.
    pub fn classify(&self, error: &(dyn StdError + 'static)) -> ErrorInfo {
        let message = error.to_string();

        let mut current = Some(error);
        while let Some(err) = current {
            if let Some(category) = recognize(err) {
                return self.build(category, message);
            }
            current = err.source();
        }

        let category = self.match_text(&message).unwrap_or(ErrorCategory::Unknown);
        self.build(category, message)
    }

    /// Classifies free-form error text using only the text patterns.
    pub fn classify_message(&self, text: &str) -> ErrorInfo {
        let category = self.match_text(text).unwrap_or(ErrorCategory::Unknown);
        self.build(category, text)
    }

    fn match_text(&self, text: &str) -> Option<ErrorCategory> {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(text))
            .map(ErrorPattern::category)
    }

    fn build(&self, category: ErrorCategory, message: impl Into<String>) -> ErrorInfo {
        let info = ErrorInfo::new(category, message);
        if category == ErrorCategory::RateLimit {
            info.with_retry_after(self.rate_limit_hint)
        } else {
            info
        }
    }
}

/// Classifies an error with the process-wide default classifier.
pub fn classify(error: &(dyn StdError + 'static)) -> ErrorInfo {
    default_classifier().classify(error)
}

/// Returns the shared default classifier.
pub fn default_classifier() -> &'static ErrorClassifier {
    static CLASSIFIER: OnceLock<ErrorClassifier> = OnceLock::new();
    CLASSIFIER.get_or_init(ErrorClassifier::new)
}

/// Recognizes a single error by its concrete type.
fn recognize(err: &(dyn StdError + 'static)) -> Option<ErrorCategory> {
    // 1. vendor client errors
    if let Some(client) = err.downcast_ref::<AgentClientError>() {
        return Some(classify_client(client));
    }

    // 2. network and timeout shapes
    if err.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
        return Some(ErrorCategory::Timeout);
    }
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        if let Some(inner) = io_err.get_ref() {
            if let Some(category) = recognize(inner) {
                return Some(category);
            }
        }
        return classify_io(io_err.kind());
    }
    if let Some(http) = err.downcast_ref::<reqwest::Error>() {
        return Some(classify_reqwest(http));
    }

    // 3. HTTP-style status codes
    if let Some(status) = err.downcast_ref::<HttpStatusError>() {
        return category_for_status(status.status);
    }

    // 5. payload shape
    if err.downcast_ref::<serde_json::Error>().is_some() {
        return Some(ErrorCategory::Validation);
    }

    None
}

fn classify_client(err: &AgentClientError) -> ErrorCategory {
    match err {
        AgentClientError::CliNotFound(_) | AgentClientError::JsonDecode(_) => {
            ErrorCategory::Validation
        }
        AgentClientError::Process { stderr, .. } => {
            let text = stderr.to_lowercase();
            if text.contains("rate limit") || text.contains("rate_limit") {
                ErrorCategory::RateLimit
            } else if text.contains("auth") || text.contains("unauthorized") {
                ErrorCategory::Auth
            } else {
                ErrorCategory::Api
            }
        }
    }
}

fn classify_io(kind: io::ErrorKind) -> Option<ErrorCategory> {
    use io::ErrorKind::*;

    match kind {
        TimedOut => Some(ErrorCategory::Timeout),
        ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected | AddrInUse
        | AddrNotAvailable | BrokenPipe => Some(ErrorCategory::Network),
        // 4. filesystem and resource errors
        NotFound | PermissionDenied | AlreadyExists | OutOfMemory | WriteZero => {
            Some(ErrorCategory::Resource)
        }
        _ => None,
    }
}

fn classify_reqwest(err: &reqwest::Error) -> ErrorCategory {
    if err.is_timeout() {
        return ErrorCategory::Timeout;
    }
    if err.is_connect() {
        return ErrorCategory::Network;
    }
    if let Some(category) = err.status().and_then(|s| category_for_status(s.as_u16())) {
        return category;
    }
    if err.is_builder() || err.is_decode() {
        return ErrorCategory::Validation;
    }
    if err.is_request() || err.is_body() {
        return ErrorCategory::Network;
    }
    ErrorCategory::Api
}

/// Maps an HTTP status code to a category.
pub fn category_for_status(status: u16) -> Option<ErrorCategory> {
    match status {
        401 | 403 => Some(ErrorCategory::Auth),
        429 => Some(ErrorCategory::RateLimit),
        400 | 422 => Some(ErrorCategory::Validation),
        402..=499 => Some(ErrorCategory::Api),
        500..=599 => Some(ErrorCategory::Api),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorSeverity;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct Plain(String);

    #[derive(Debug, thiserror::Error)]
    #[error("request to upstream failed")]
    struct Wrapper(#[source] HttpStatusError);

    fn plain(msg: &str) -> Plain {
        Plain(msg.to_string())
    }

    #[test]
    fn test_vendor_process_error_rate_limit() {
        let err = AgentClientError::process(Some(1), "Error: Rate limit reached for requests");
        let info = classify(&err);
        assert_eq!(info.category, ErrorCategory::RateLimit);
        assert_eq!(info.severity, ErrorSeverity::Low);
        assert_eq!(info.retry_after, Some(DEFAULT_RATE_LIMIT_HINT));
    }

    #[test]
    fn test_vendor_process_error_auth() {
        let err = AgentClientError::process(Some(1), "401 Unauthorized");
        let info = classify(&err);
        assert_eq!(info.category, ErrorCategory::Auth);
        assert_eq!(info.severity, ErrorSeverity::High);
    }

    #[test]
    fn test_vendor_process_error_falls_through_to_api() {
        // "connection" would match the network heuristic, but the vendor type wins
        let err = AgentClientError::process(Some(2), "connection closed by agent");
        assert_eq!(classify(&err).category, ErrorCategory::Api);
    }

    #[test]
    fn test_vendor_cli_not_found_and_json_decode() {
        let not_found = AgentClientError::CliNotFound("claude".to_string());
        let decode = AgentClientError::JsonDecode("expected value at line 1".to_string());
        assert_eq!(classify(&not_found).category, ErrorCategory::Validation);
        assert_eq!(classify(&decode).category, ErrorCategory::Validation);
    }

    #[test]
    fn test_io_error_kinds() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");

        assert_eq!(classify(&refused).category, ErrorCategory::Network);
        assert_eq!(classify(&timed_out).category, ErrorCategory::Timeout);
        assert_eq!(classify(&missing).category, ErrorCategory::Resource);
        assert_eq!(classify(&denied).category, ErrorCategory::Resource);
    }

    #[test]
    fn test_io_error_wrapping_vendor_error() {
        let inner = AgentClientError::process(None, "rate limit");
        let err = io::Error::new(io::ErrorKind::Other, inner);
        assert_eq!(classify(&err).category, ErrorCategory::RateLimit);
    }

    #[tokio::test]
    async fn test_tokio_elapsed_is_timeout() {
        let elapsed = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(classify(&elapsed).category, ErrorCategory::Timeout);
    }

    #[test]
    fn test_reqwest_builder_error_is_validation() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert_eq!(classify(&err).category, ErrorCategory::Validation);
    }

    #[test]
    fn test_http_status_codes() {
        let cases = [
            (401, ErrorCategory::Auth),
            (403, ErrorCategory::Auth),
            (429, ErrorCategory::RateLimit),
            (500, ErrorCategory::Api),
            (503, ErrorCategory::Api),
            (422, ErrorCategory::Validation),
            (404, ErrorCategory::Api),
        ];
        for (status, expected) in cases {
            let err = HttpStatusError::new(status, "boom");
            assert_eq!(classify(&err).category, expected, "status {}", status);
        }
    }

    #[test]
    fn test_source_chain_is_walked() {
        let err = Wrapper(HttpStatusError::new(429, "slow down"));
        let info = classify(&err);
        assert_eq!(info.category, ErrorCategory::RateLimit);
        // the message is the outermost error's own description
        assert_eq!(info.message, "request to upstream failed");
    }

    #[test]
    fn test_serde_json_error_is_validation() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(classify(&err).category, ErrorCategory::Validation);
    }

    #[test]
    fn test_message_heuristics() {
        let cases = [
            ("Network is unreachable", ErrorCategory::Network),
            ("operation timed out", ErrorCategory::Timeout),
            ("Too Many Requests", ErrorCategory::RateLimit),
            ("invalid api key provided", ErrorCategory::Auth),
            ("Authorization required", ErrorCategory::Auth),
            ("authorization header missing", ErrorCategory::Auth),
            ("schema mismatch in field 'id'", ErrorCategory::Validation),
            ("No such file or directory", ErrorCategory::Resource),
            ("upstream returned 502", ErrorCategory::Api),
        ];
        for (text, expected) in cases {
            assert_eq!(classify(&plain(text)).category, expected, "text {:?}", text);
        }
    }

    #[test]
    fn test_unrecognized_is_unknown_medium() {
        let info = classify(&plain("something odd happened"));
        assert_eq!(info.category, ErrorCategory::Unknown);
        assert_eq!(info.severity, ErrorSeverity::Medium);
        assert_eq!(info.message, "something odd happened");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let err = HttpStatusError::new(500, "Internal Server Error");
        assert_eq!(classify(&err), classify(&err));
    }

    #[test]
    fn test_custom_pattern() {
        let mut classifier = ErrorClassifier::with_patterns(Vec::new());
        assert_eq!(
            classifier.classify_message("overloaded_error").category,
            ErrorCategory::Unknown
        );

        classifier.add_pattern(ErrorPattern::new(
            r"overloaded",
            ErrorCategory::Api,
            "Provider overloaded",
        ));
        assert_eq!(
            classifier.classify_message("overloaded_error").category,
            ErrorCategory::Api
        );
        assert_eq!(classifier.patterns().len(), 1);
    }

    #[test]
    fn test_try_new_rejects_invalid_regex() {
        assert!(ErrorPattern::try_new("(unclosed", ErrorCategory::Api, "bad").is_err());
    }

    #[test]
    fn test_rate_limit_hint_is_configurable() {
        let classifier = ErrorClassifier::new().with_rate_limit_hint(Duration::from_secs(5));
        let info = classifier.classify_message("rate limited");
        assert_eq!(info.retry_after, Some(Duration::from_secs(5)));
    }
}
