//! Top-level error types for the release CLI.
//!
//! This module maps every failure to a process exit code and to actionable
//! recovery suggestions.

use crate::bundler;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Packaging, feed or publish errors
    #[error("{0}")]
    Bundler(#[from] bundler::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// The run was interrupted by a signal
    #[error("Interrupted during {command}")]
    Interrupted {
        /// Command that was running
        command: String,
    },
}

impl ReleaseError {
    /// Process exit code for this error.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 2 | configuration or argument error |
    /// | 3 | resource stayed busy |
    /// | 4 | existing feed or property list is malformed |
    /// | 5 | one or more uploads failed |
    /// | 130 | interrupted |
    /// | 1 | anything else |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cli(CliError::InvalidArguments { .. }) => 2,
            Self::Cli(CliError::Interrupted { .. }) => 130,
            Self::Bundler(e) => match e.root() {
                bundler::Error::Config(_) => 2,
                bundler::Error::ResourceBusy { .. } => 3,
                bundler::Error::Parse { .. } => 4,
                bundler::Error::Transport { .. } => 5,
                _ => 1,
            },
            Self::Io(_) | Self::Json(_) => 1,
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        let Self::Bundler(e) = self else {
            return vec!["Run with --help to see the accepted arguments".to_string()];
        };

        match e.root() {
            bundler::Error::Config(_) => vec![
                "Check appcast.toml and the app's Info.plist".to_string(),
                "Run `version current` to see which values were resolved".to_string(),
            ],
            bundler::Error::ResourceBusy { resource, .. } => vec![
                format!("Close any Finder window or process using {}", resource),
                "Eject stale volumes with `hdiutil detach -force <mount point>`".to_string(),
                "Make sure no other release run is in progress".to_string(),
            ],
            bundler::Error::Parse { path, .. } => vec![format!(
                "Fix or remove {} and re-run; a missing feed is recreated",
                path.display()
            )],
            bundler::Error::Transport { .. } => vec![
                "Check network access and credentials for the publish host".to_string(),
                "Re-run `upload`; artifacts are replaced atomically".to_string(),
            ],
            bundler::Error::Tool { tool, .. } => {
                vec![format!("Make sure `{}` is installed and on PATH", tool)]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
