//! External tool detection and availability checking.
//!
//! Packaging needs `hdiutil` and `osascript` (and optionally `SetFile`);
//! publishing needs `rsync`, or `scp` plus `ssh`. Missing tools are reported
//! up front instead of surfacing as a spawn error halfway through a run.

use std::path::PathBuf;

/// Tools the `assemble` stage runs.
pub const PACKAGING_TOOLS: &[&str] = &["hdiutil", "osascript"];

/// Optional packaging tools; their absence only degrades the result.
pub const OPTIONAL_PACKAGING_TOOLS: &[&str] = &["SetFile"];

/// Tools the `publish` stage runs over rsync.
pub const RSYNC_TOOLS: &[&str] = &["rsync"];

/// Tools the `publish` stage runs over scp.
pub const SCP_TOOLS: &[&str] = &["scp", "ssh"];

/// Looks up `tool` in `PATH`.
pub fn locate(tool: &str) -> Option<PathBuf> {
    match which::which(tool) {
        Ok(path) => {
            log::debug!("Found {} at: {}", tool, path.display());
            Some(path)
        }
        Err(e) => {
            log::debug!("{} not found in PATH: {}", tool, e);
            None
        }
    }
}

/// Returns the subset of `tools` that cannot be found.
pub fn missing_tools<'t>(tools: &[&'t str]) -> Vec<&'t str> {
    tools
        .iter()
        .copied()
        .filter(|tool| locate(tool).is_none())
        .collect()
}
