//! Idempotent artifact publishing over rsync or scp.
//!
//! Every artifact is attempted even when an earlier one failed; the
//! [`PublishReport`] records each outcome and
//! [`PublishReport::into_result`] turns any failure into one transport error.

pub mod commands;
mod report;

pub use report::{ArtifactOutcome, PublishReport, UploadStatus};

use crate::bundler::{
    ArtifactSet,
    builder::calculate_sha256,
    error::{Error, Result},
    settings::{ReleaseConfig, TransportProtocol, TransportTarget},
    utils::{ToolRunner, run_checked},
};
use std::path::Path;

/// Collects the artifact paths produced by the earlier stages.
///
/// # Errors
///
/// [`Error::Config`] naming every expected file that does not exist.
pub fn resolve_artifacts(config: &ReleaseConfig) -> Result<ArtifactSet> {
    let artifacts = config.artifact_set();
    let missing: Vec<String> = artifacts
        .paths()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect();

    if missing.is_empty() {
        Ok(artifacts)
    } else {
        Err(Error::config(format!(
            "missing artifact(s) to publish: {}",
            missing.join(", ")
        )))
    }
}

/// Uploads artifacts to one [`TransportTarget`].
#[derive(Debug)]
pub struct PublishTransport<'a, R: ToolRunner> {
    runner: &'a R,
    target: &'a TransportTarget,
}

impl<'a, R: ToolRunner> PublishTransport<'a, R> {
    pub fn new(runner: &'a R, target: &'a TransportTarget) -> Self {
        Self { runner, target }
    }

    pub fn target(&self) -> &TransportTarget {
        self.target
    }

    /// Uploads every artifact, one transfer each, and reports per artifact.
    ///
    /// Only returns `Err` for problems that prevent any attempt; individual
    /// upload failures are recorded in the report.
    pub async fn upload(&self, artifacts: &ArtifactSet) -> Result<PublishReport> {
        let destination = self.target.destination_dir();
        log::info!(
            "Publishing {} artifact(s) to {} via {}",
            artifacts.paths().count(),
            destination,
            self.target.protocol
        );

        let mut report = PublishReport::new(destination);
        for path in artifacts.paths() {
            let outcome = self.upload_one(path).await;
            match &outcome.status {
                UploadStatus::Uploaded => log::info!("✓ Uploaded {}", outcome.name),
                UploadStatus::Failed(reason) => {
                    log::error!("Failed to upload {}: {}", outcome.name, reason)
                }
            }
            report.push(outcome);
        }

        Ok(report)
    }

    async fn upload_one(&self, path: &Path) -> ArtifactOutcome {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut outcome = ArtifactOutcome {
            name,
            path: path.to_path_buf(),
            bytes: 0,
            sha256: String::new(),
            status: UploadStatus::Uploaded,
        };

        let result: Result<()> = async {
            outcome.bytes = tokio::fs::metadata(path).await?.len();
            outcome.sha256 = calculate_sha256(path).await?;
            self.transfer(path, &outcome.name).await
        }
        .await;

        if let Err(e) = result {
            outcome.status = UploadStatus::Failed(e.to_string());
        }
        outcome
    }

    async fn transfer(&self, path: &Path, name: &str) -> Result<()> {
        match self.target.protocol {
            TransportProtocol::Rsync => {
                let command = commands::rsync(self.target, path)?;
                run_checked(self.runner, &command).await?;
            }
            TransportProtocol::Scp => {
                let command = commands::scp(self.target, path, name)?;
                run_checked(self.runner, &command).await?;
                let rename = commands::ssh_rename(self.target, name);
                run_checked(self.runner, &rename).await?;
            }
        }
        Ok(())
    }
}
