//! Resilience configuration for strikeguard.
//!
//! Strike and circuit-breaker settings can be loaded from a TOML file and
//! overridden through the environment:
//!
//! ```toml
//! [strike]
//! max_retries = 3
//! rate_limit_delay_secs = 60.0
//! extended_rate_limit_delay_secs = 120.0
//! delay_scale = 1.0
//!
//! [breaker]
//! failure_threshold = 5
//! cooldown_seconds = 60.0
//! ```

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::breaker::CircuitBreakerConfig;
use crate::strike::StrikeConfig;

/// Prefix of environment overrides, e.g. `STRIKEGUARD__STRIKE__MAX_RETRIES`.
pub const ENV_PREFIX: &str = "STRIKEGUARD";

/// Errors that can occur when loading resilience configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Strike protocol settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrikeSettings {
    /// Strike budget.
    pub max_retries: u32,
    /// Wait after a rate-limit failure on strike 1, in seconds.
    pub rate_limit_delay_secs: f64,
    /// Wait after a rate-limit failure on later strikes, in seconds.
    pub extended_rate_limit_delay_secs: f64,
    /// Multiplier applied to every backoff wait.
    pub delay_scale: f64,
}

impl Default for StrikeSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_delay_secs: 60.0,
            extended_rate_limit_delay_secs: 120.0,
            delay_scale: 1.0,
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before admitting a trial call, in seconds.
    pub cooldown_seconds: f64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_seconds: 60.0,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Strike protocol settings
    pub strike: StrikeSettings,
    /// Circuit breaker settings
    pub breaker: BreakerSettings,
}

impl ResilienceConfig {
    /// Load resilience configuration from a file path.
    ///
    /// Values from the file can be overridden by environment variables of the
    /// form `STRIKEGUARD__<SECTION>__<KEY>`, for example
    /// `STRIKEGUARD__BREAKER__FAILURE_THRESHOLD=3`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path is invalid
    /// - The configuration file does not exist
    /// - The configuration file cannot be parsed
    /// - A value fails [`validate`](Self::validate)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use strikeguard::settings::ResilienceConfig;
    ///
    /// let config = ResilienceConfig::load("strikeguard.toml")?;
    /// # Ok::<(), strikeguard::settings::ConfigError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path_str.to_string()));
        }

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(env_overrides())
            .build()?;

        let resilience: ResilienceConfig = config.try_deserialize()?;
        resilience.validate()?;
        Ok(resilience)
    }

    /// Loads defaults overridden by the environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder().add_source(env_overrides()).build()?;
        let resilience: ResilienceConfig = config.try_deserialize()?;
        resilience.validate()?;
        Ok(resilience)
    }

    /// Parses configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(s, FileFormat::Toml))
            .build()?;
        let resilience: ResilienceConfig = config.try_deserialize()?;
        resilience.validate()?;
        Ok(resilience)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strike.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "strike.max_retries must be at least 1".to_string(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "breaker.failure_threshold must be at least 1".to_string(),
            ));
        }

        for (name, value) in [
            ("strike.rate_limit_delay_secs", self.strike.rate_limit_delay_secs),
            (
                "strike.extended_rate_limit_delay_secs",
                self.strike.extended_rate_limit_delay_secs,
            ),
            ("strike.delay_scale", self.strike.delay_scale),
            ("breaker.cooldown_seconds", self.breaker.cooldown_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }

        if self.strike.extended_rate_limit_delay_secs < self.strike.rate_limit_delay_secs {
            return Err(ConfigError::Invalid(
                "strike.extended_rate_limit_delay_secs must not be shorter than strike.rate_limit_delay_secs"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Strike configuration for a [`StrikeHandler`](crate::strike::StrikeHandler).
    pub fn strike_config(&self) -> StrikeConfig {
        StrikeConfig::new()
            .with_max_retries(self.strike.max_retries)
            .with_rate_limit_delay(secs(self.strike.rate_limit_delay_secs))
            .with_extended_rate_limit_delay(secs(self.strike.extended_rate_limit_delay_secs))
            .with_delay_scale(self.strike.delay_scale)
    }

    /// Circuit breaker configuration.
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(self.breaker.failure_threshold, self.breaker.cooldown_seconds)
    }
}

impl From<&ResilienceConfig> for StrikeConfig {
    fn from(config: &ResilienceConfig) -> Self {
        config.strike_config()
    }
}

impl From<&ResilienceConfig> for CircuitBreakerConfig {
    fn from(config: &ResilienceConfig) -> Self {
        config.breaker_config()
    }
}

fn env_overrides() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(config.strike.max_retries, 3);
        assert_eq!(config.strike.rate_limit_delay_secs, 60.0);
        assert_eq!(config.strike.extended_rate_limit_delay_secs, 120.0);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.cooldown_seconds, 60.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let config = ResilienceConfig::from_toml_str(
            r#"
            [breaker]
            failure_threshold = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.breaker.cooldown_seconds, 60.0);
        assert_eq!(config.strike, StrikeSettings::default());
    }

    #[test]
    fn test_parse_empty_toml() {
        let config = ResilienceConfig::from_toml_str("").unwrap();
        assert_eq!(config, ResilienceConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let err = ResilienceConfig::from_toml_str("[strike]\nmax_retries = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_validate_rejects_negative_cooldown() {
        let mut config = ResilienceConfig::default();
        config.breaker.cooldown_seconds = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_short_extended_delay() {
        let mut config = ResilienceConfig::default();
        config.strike.extended_rate_limit_delay_secs = 30.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("extended_rate_limit_delay_secs"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = ResilienceConfig::from_toml_str("[strike\nmax_retries = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_file_not_found() {
        let result = ResilienceConfig::load("nonexistent/path/strikeguard.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[strike]\nmax_retries = 4\nrate_limit_delay_secs = 10.0\n\n[breaker]\ncooldown_seconds = 5.5"
        )
        .unwrap();

        let config = ResilienceConfig::load(file.path()).unwrap();
        assert_eq!(config.strike.max_retries, 4);
        assert_eq!(config.strike.rate_limit_delay_secs, 10.0);
        assert_eq!(config.breaker.cooldown_seconds, 5.5);
    }

    #[test]
    fn test_conversions() {
        let config = ResilienceConfig::from_toml_str(
            r#"
            [strike]
            max_retries = 5
            rate_limit_delay_secs = 1.5
            delay_scale = 0.0

            [breaker]
            failure_threshold = 3
            cooldown_seconds = 2.0
            "#,
        )
        .unwrap();

        let strike = StrikeConfig::from(&config);
        assert_eq!(strike.max_retries, 5);
        assert_eq!(strike.rate_limit_delay, Duration::from_millis(1500));
        assert_eq!(strike.extended_rate_limit_delay, Duration::from_secs(120));
        assert_eq!(strike.delay_scale, 0.0);

        let breaker = CircuitBreakerConfig::from(&config);
        assert_eq!(breaker.failure_threshold, 3);
        assert_eq!(breaker.cooldown, Duration::from_secs(2));
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let rendered = ResilienceConfig::default().to_toml_string().unwrap();
        assert!(rendered.contains("[strike]"));
        assert!(rendered.contains("failure_threshold = 5"));
        assert_eq!(
            ResilienceConfig::from_toml_str(&rendered).unwrap(),
            ResilienceConfig::default()
        );
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::FileNotFound("test.toml".to_string());
        assert_eq!(err.to_string(), "configuration file not found: test.toml");

        let err = ConfigError::InvalidPath("invalid/path".to_string());
        assert_eq!(err.to_string(), "invalid configuration path: invalid/path");
    }
}
