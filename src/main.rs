use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use strikeguard::breaker::CircuitBreaker;
use strikeguard::error::{default_classifier, ErrorCategory};
use strikeguard::logging::{init_logging, LoggingConfig};
use strikeguard::settings::ResilienceConfig;
use strikeguard::simulate::{run_simulation, Outcome};
use strikeguard::strike::{fibonacci_delay, StrikeHandler};

#[derive(Parser, Debug)]
#[command(name = "strikeguard")]
#[command(version)]
#[command(about = "Three-strike retry protocol with circuit breaking for unreliable dependencies")]
struct Cli {
    /// Suppress all log output except escalation reports
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the fibonacci backoff table
    Backoff {
        /// Last attempt to print
        #[arg(long, default_value = "8")]
        max_attempt: u32,
    },

    /// Classify a free-text error message
    Classify {
        /// The error message to classify
        message: String,
    },

    /// Run a synthetic failing operation through the strike handler
    Simulate {
        /// Category of the scripted failures
        #[arg(long, short, value_parser = parse_category)]
        category: ErrorCategory,

        /// Number of failures before the operation succeeds
        #[arg(long, short)]
        failures: u32,

        /// Strike budget (overrides the configuration file)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Multiplier applied to every wait (0 = no real waiting)
        #[arg(long, default_value = "0.0")]
        time_scale: f64,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn parse_category(s: &str) -> Result<ErrorCategory, String> {
    s.parse::<ErrorCategory>()
}

/// Exit codes for the simulate command
mod exit_codes {
    use std::process::ExitCode;

    /// The operation succeeded
    pub fn success() -> ExitCode {
        ExitCode::from(0)
    }

    /// The handler escalated or the call was cancelled
    pub fn escalated() -> ExitCode {
        ExitCode::from(1)
    }

    /// The circuit breaker rejected the call
    pub fn circuit_open() -> ExitCode {
        ExitCode::from(75)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LoggingConfig::from_flags(cli.verbose, cli.quiet)) {
        eprintln!("warning: logging disabled: {}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Backoff { max_attempt } => {
            println!("{:>8}  {:>8}", "attempt", "delay");
            for attempt in 1..=max_attempt.max(1) {
                println!(
                    "{:>8}  {:>7.1}s",
                    attempt,
                    fibonacci_delay(attempt).as_secs_f64()
                );
            }
        }
        Commands::Classify { message } => {
            let info = default_classifier().classify_message(&message);
            println!("category:  {}", info.category);
            println!("severity:  {}", info.severity);
            println!("retryable: {}", info.is_retryable());
            if let Some(retry_after) = info.retry_after {
                println!("retry after: {:.1}s", retry_after.as_secs_f64());
            }
        }
        Commands::Simulate {
            category,
            failures,
            max_retries,
            ref config,
            time_scale,
        } => {
            return run_simulate(category, failures, max_retries, config.as_deref(), time_scale)
                .await;
        }
        Commands::Config { ref config } => {
            let resilience = load_config(config.as_deref())?;
            print!("{}", resilience.to_toml_string()?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Loads the configuration file if given, otherwise defaults plus environment.
fn load_config(path: Option<&Path>) -> Result<ResilienceConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ResilienceConfig::load(path)?,
        None => ResilienceConfig::from_env()?,
    };
    Ok(config)
}

async fn run_simulate(
    category: ErrorCategory,
    failures: u32,
    max_retries: Option<u32>,
    config: Option<&Path>,
    time_scale: f64,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if !time_scale.is_finite() || time_scale < 0.0 {
        return Err(format!("--time-scale must be a non-negative number (got {})", time_scale).into());
    }

    let resilience = load_config(config)?;
    let mut strike = resilience.strike_config().with_delay_scale(time_scale);
    if let Some(max_retries) = max_retries {
        strike = strike.with_max_retries(max_retries);
    }

    let handler = StrikeHandler::with_config(strike).with_circuit_breaker(Arc::new(
        CircuitBreaker::with_config(resilience.breaker_config()),
    ));

    let report = run_simulation(&handler, category, failures).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(match report.outcome {
        Outcome::Success => exit_codes::success(),
        Outcome::Escalated | Outcome::Cancelled => exit_codes::escalated(),
        Outcome::CircuitOpen => exit_codes::circuit_open(),
    })
}
