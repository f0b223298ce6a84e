//! strikeguard - three-strike retry protocol for unreliable dependencies
//!
//! Wrap calls to an external service in a [`StrikeHandler`]. Each failure is
//! classified into an [`ErrorCategory`], counted by a shared
//! [`CircuitBreaker`], and answered with a backoff wait or an escalation.
//!
//! ```no_run
//! use strikeguard::{Context, StrikeHandler};
//!
//! # async fn fetch() -> Result<String, std::io::Error> { Ok(String::new()) }
//! # async fn demo() {
//! let handler = StrikeHandler::new();
//! let result = handler.execute_with_retry(|| fetch(), Context::new()).await;
//! # let _ = result;
//! # }
//! ```

pub mod breaker;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod settings;
pub mod simulate;
pub mod strike;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStatus};
pub use error::{classify, ErrorCategory, ErrorClassifier, ErrorInfo, ErrorSeverity};
pub use metrics::{MetricsSnapshot, StrikeMetrics};
pub use settings::{ConfigError, ResilienceConfig};
pub use strike::{
    fibonacci_delay, retry_with_backoff, Context, Escalation, EscalationError, EscalationReport,
    FnEscalation, RetryContext, StrikeConfig, StrikeDecision, StrikeError, StrikeHandler,
};
