//! Per-artifact publish results.

use crate::bundler::error::{Error, Result};
use serde::Serialize;
use std::{fmt, path::PathBuf};

/// Result of uploading one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    Failed(String),
}

/// One artifact's entry in the [`PublishReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactOutcome {
    /// File name on the remote side
    pub name: String,
    pub path: PathBuf,
    /// Size in bytes at upload time
    pub bytes: u64,
    /// Hex SHA-256 of the local file
    pub sha256: String,
    pub status: UploadStatus,
}

impl ArtifactOutcome {
    pub fn is_uploaded(&self) -> bool {
        self.status == UploadStatus::Uploaded
    }
}

/// What a publish attempted and how each artifact fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    /// `user@host:dir/` the artifacts were sent to
    pub destination: String,
    pub outcomes: Vec<ArtifactOutcome>,
}

impl PublishReport {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: ArtifactOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes.iter().filter(|o| o.is_uploaded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes.iter().filter(|o| !o.is_uploaded())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ArtifactOutcome::is_uploaded)
    }

    /// Turns any recorded failure into one [`Error::Transport`] listing all
    /// of them.
    pub fn into_result(self) -> Result<Self> {
        let failures: Vec<String> = self
            .failed()
            .map(|o| match &o.status {
                UploadStatus::Failed(reason) => format!("{}: {}", o.name, reason),
                UploadStatus::Uploaded => o.name.clone(),
            })
            .collect();

        if failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::Transport { failures })
        }
    }
}

impl fmt::Display for PublishReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Publish to {}", self.destination)?;
        for outcome in &self.outcomes {
            match &outcome.status {
                UploadStatus::Uploaded => writeln!(
                    f,
                    "  ✓ {} ({} bytes, sha256 {})",
                    outcome.name, outcome.bytes, outcome.sha256
                )?,
                UploadStatus::Failed(reason) => {
                    writeln!(f, "  ✗ {}: {}", outcome.name, reason)?
                }
            }
        }
        Ok(())
    }
}
