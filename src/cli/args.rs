//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap derive, with one
//! subcommand per release stage plus the full release and version helpers.

use crate::metadata::VersionPart;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DMG packaging, Sparkle appcast maintenance and release publishing
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_appcast",
    version,
    about = "DMG packaging, Sparkle appcast maintenance and release publishing for macOS apps",
    long_about = "Packages a built macOS application into a compressed DMG, records the release in a Sparkle appcast feed and uploads the DMG, the feed and the release notes.

Usage:
  kodegen_bundler_appcast dmg
  kodegen_bundler_appcast feed
  kodegen_bundler_appcast upload
  kodegen_bundler_appcast release --build-type Release
  kodegen_bundler_appcast version bump patch

Exit codes: 0 success, 2 configuration, 3 resource busy, 4 malformed feed, 5 upload failure, 130 interrupted."
)]
pub struct Args {
    /// Configuration file, relative to the project directory
    #[arg(short, long, value_name = "PATH", default_value = "appcast.toml", global = true)]
    pub config: PathBuf,

    /// Project directory all relative paths are resolved against
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".", global = true)]
    pub project_dir: PathBuf,

    /// Build type selecting `build/{BUILD_TYPE}`
    #[arg(long, env = "BUILD_TYPE", value_name = "TYPE", global = true)]
    pub build_type: Option<String>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Release stages and helpers
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Build the compressed DMG
    Dmg,

    /// Add the current release to the appcast feed and write the release notes
    Feed,

    /// Upload the DMG, the feed and the release notes
    Upload {
        /// Feed file to publish instead of the one in the output directory
        #[arg(long, value_name = "PATH")]
        feed: Option<PathBuf>,
    },

    /// Build, record and upload in one run
    Release,

    /// Inspect or change the application version
    Version {
        #[command(subcommand)]
        action: VersionAction,
    },
}

/// `version` subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum VersionAction {
    /// Print the resolved version
    Current,

    /// Increment CFBundleVersion in the property list
    Bump {
        #[arg(value_enum)]
        part: VersionPart,
    },
}

impl Command {
    /// Name used in log lines and interruption errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dmg => "dmg",
            Self::Feed => "feed",
            Self::Upload { .. } => "upload",
            Self::Release => "release",
            Self::Version { .. } => "version",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if let Some(build_type) = &self.build_type {
            if build_type.contains(['/', '\\']) {
                return Err(format!(
                    "Invalid build type: {}. It becomes a single directory name",
                    build_type
                ));
            }
        }
        Ok(())
    }

    /// Config file path resolved against the project directory.
    pub fn config_path(&self) -> PathBuf {
        if self.config.is_absolute() {
            self.config.clone()
        } else {
            self.project_dir.join(&self.config)
        }
    }

    /// Default log filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
