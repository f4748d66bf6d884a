//! DMG packaging, Sparkle appcast maintenance and release publishing for
//! macOS applications.
//!
//! This library provides the release pipeline:
//! - Assembling a compressed, laid-out DMG from a built application
//! - Upserting the release into an RSS appcast feed with rendered notes
//! - Uploading the DMG, the feed and the notes over rsync or scp
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod error;
pub mod metadata;

// Re-export commonly used types
pub use error::{CliError, ReleaseError, Result};
