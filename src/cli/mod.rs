//! Command line interface for the release tool.
//!
//! This module provides argument parsing, command execution and the mapping
//! of failures to exit codes.

mod args;
pub mod commands;

pub use args::{Args, Command, VersionAction};

use crate::error::{CliError, Result};

/// Main CLI entry point
///
/// Returns the process exit code. Failures are logged here together with
/// their recovery suggestions.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(&args);

    if let Err(reason) = args.validate() {
        return Err(CliError::InvalidArguments { reason }.into());
    }

    match commands::execute(&args).await {
        Ok(()) => Ok(0),
        Err(e) => {
            log::error!("{}", e);
            for suggestion in e.recovery_suggestions() {
                log::info!("  → {}", suggestion);
            }
            Ok(e.exit_code())
        }
    }
}

/// Initializes `env_logger`, `RUST_LOG` taking precedence over `-v`.
fn init_logging(args: &Args) {
    let env = env_logger::Env::default().default_filter_or(args.log_filter());
    let _ = env_logger::Builder::from_env(env)
        .format_target(false)
        .try_init();
}
