//! CLI integration tests for the strikeguard binary
//!
//! These tests verify that the CLI commands work correctly by running
//! the actual compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command instance for the strikeguard binary
#[allow(deprecated)]
fn strikeguard_cmd() -> Command {
    let mut cmd = Command::cargo_bin("strikeguard").expect("Failed to find strikeguard binary");
    cmd.env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// --help / --version tests
// ============================================================================

#[test]
fn test_help_lists_commands() {
    strikeguard_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Three-strike retry protocol"))
        .stdout(predicate::str::contains("backoff"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    strikeguard_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_subcommand_fails() {
    strikeguard_cmd().assert().failure();
}

#[test]
fn test_quiet_conflicts_with_verbose() {
    strikeguard_cmd()
        .args(["-q", "-v", "backoff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

// ============================================================================
// backoff command tests
// ============================================================================

#[test]
fn test_backoff_table() {
    strikeguard_cmd()
        .arg("backoff")
        .assert()
        .success()
        .stdout(predicate::str::contains("attempt"))
        .stdout(predicate::str::contains("8.0s"))
        .stdout(predicate::str::contains("30.0s"));
}

#[test]
fn test_backoff_max_attempt() {
    strikeguard_cmd()
        .args(["backoff", "--max-attempt", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0s"))
        .stdout(predicate::str::contains("3.0s").not());
}

// ============================================================================
// classify command tests
// ============================================================================

#[test]
fn test_classify_rate_limit() {
    strikeguard_cmd()
        .args(["classify", "429 Too Many Requests"])
        .assert()
        .success()
        .stdout(predicate::str::contains("category:  rate_limit"))
        .stdout(predicate::str::contains("retryable: true"))
        .stdout(predicate::str::contains("retry after: 60.0s"));
}

#[test]
fn test_classify_auth_is_not_retryable() {
    strikeguard_cmd()
        .args(["classify", "401 Unauthorized: invalid API key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("category:  auth"))
        .stdout(predicate::str::contains("severity:  high"))
        .stdout(predicate::str::contains("retryable: false"));
}

#[test]
fn test_classify_unknown() {
    strikeguard_cmd()
        .args(["classify", "something odd happened"])
        .assert()
        .success()
        .stdout(predicate::str::contains("category:  unknown"));
}

// ============================================================================
// simulate command tests
// ============================================================================

#[test]
fn test_simulate_recovers() {
    strikeguard_cmd()
        .args(["simulate", "--category", "network", "--failures", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""outcome": "success""#))
        .stdout(predicate::str::contains(r#""attempts": 3"#));
}

#[test]
fn test_simulate_escalates_fatal_error() {
    strikeguard_cmd()
        .args(["-q", "simulate", "--category", "auth", "--failures", "1"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""outcome": "escalated""#))
        .stdout(predicate::str::contains(r#""attempts": 1"#))
        .stderr(predicate::str::contains("escalating auth failure"));
}

#[test]
fn test_simulate_respects_max_retries() {
    strikeguard_cmd()
        .args([
            "simulate",
            "--category",
            "rate-limit",
            "--failures",
            "10",
            "--max-retries",
            "5",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""attempts": 5"#));
}

#[test]
fn test_simulate_rejects_unknown_category() {
    strikeguard_cmd()
        .args(["simulate", "--category", "cosmic-ray", "--failures", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown error category"));
}

#[test]
fn test_simulate_with_config_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("strikeguard.toml");
    std::fs::write(&path, "[strike]\nmax_retries = 2\n").expect("Failed to write config");

    strikeguard_cmd()
        .args(["simulate", "--category", "api", "--failures", "5", "--config"])
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""attempts": 2"#));
}

// ============================================================================
// config command tests
// ============================================================================

#[test]
fn test_config_prints_defaults() {
    strikeguard_cmd()
        .arg("config")
        .env_remove("STRIKEGUARD__STRIKE__MAX_RETRIES")
        .assert()
        .success()
        .stdout(predicate::str::contains("[strike]"))
        .stdout(predicate::str::contains("max_retries = 3"))
        .stdout(predicate::str::contains("[breaker]"))
        .stdout(predicate::str::contains("failure_threshold = 5"));
}

#[test]
fn test_config_env_override() {
    strikeguard_cmd()
        .arg("config")
        .env("STRIKEGUARD__BREAKER__FAILURE_THRESHOLD", "2")
        .assert()
        .success()
        .stdout(predicate::str::contains("failure_threshold = 2"));
}

#[test]
fn test_config_missing_file() {
    strikeguard_cmd()
        .args(["config", "--config", "does/not/exist.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}
