//! Mounted writable volume with guaranteed release.
//!
//! A [`MountedVolume`] owns the mount itself plus the [`Intermediates`] guard
//! for the read-write image and the staging directory. The async paths
//! ([`MountedVolume::detach`], [`MountedVolume::discard`]) release them
//! through the [`ToolRunner`]. If the value is dropped while still mounted
//! (cancelled task, panic) the `Drop` impl force-detaches synchronously with a
//! bounded wait, after which the guard deletes the leftovers.

use super::{cleanup::Intermediates, staging::StagedEntry};
use crate::bundler::{
    error::{Error, Result},
    utils::{Attempt, RetryPolicy, ToolCommand, ToolOutput, ToolRunner, retry_while_busy},
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// How long `Drop` waits for a forced detach before killing `hdiutil`.
const DROP_DETACH_TIMEOUT: Duration = Duration::from_secs(15);

/// Exit code `hdiutil` uses for `EBUSY`.
const EBUSY: i32 = 16;

/// Whether a failed `hdiutil` call reported a transiently busy resource.
pub(crate) fn is_busy(output: &ToolOutput) -> bool {
    if output.code == Some(EBUSY) {
        return true;
    }
    let stderr = output.stderr.to_ascii_lowercase();
    stderr.contains("resource busy") || stderr.contains("resource temporarily unavailable")
}

/// A writable disk image mounted as a named volume.
#[derive(Debug)]
pub struct MountedVolume {
    name: String,
    mount_point: PathBuf,
    image: PathBuf,
    entries: Vec<StagedEntry>,
    mounted: bool,
    intermediates: Intermediates,
}

impl MountedVolume {
    pub(crate) fn new(
        name: String,
        mount_point: PathBuf,
        image: PathBuf,
        entries: Vec<StagedEntry>,
        intermediates: Intermediates,
    ) -> Self {
        Self {
            name,
            mount_point,
            image,
            entries,
            mounted: true,
            intermediates,
        }
    }

    /// Volume name shown in Finder.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Intermediate read-write image backing the volume.
    pub fn image(&self) -> &Path {
        &self.image
    }

    pub fn staging_dir(&self) -> &Path {
        self.intermediates.staging_dir()
    }

    /// Entries staged into the volume, in layout order.
    pub fn entries(&self) -> &[StagedEntry] {
        &self.entries
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Unmounts the volume, retrying while `hdiutil` reports it busy.
    ///
    /// The final attempt adds `-force`. Exhaustion yields
    /// [`Error::ResourceBusy`]; the volume stays mounted as far as the drop
    /// guard is concerned.
    pub async fn detach<R: ToolRunner>(&mut self, runner: &R, policy: &RetryPolicy) -> Result<()> {
        if !self.mounted {
            return Ok(());
        }

        log::debug!("Detaching {}", self.mount_point.display());
        let resource = self.mount_point.display().to_string();
        let attempts = policy.attempts.max(1);
        let mount_point = self.mount_point.clone();

        retry_while_busy(policy, &resource, |attempt| {
            let mount_point = mount_point.clone();
            async move {
                let output = runner
                    .run(&detach_command(&mount_point, attempt == attempts)?)
                    .await?;
                if output.success() {
                    Ok(Attempt::Done(()))
                } else if is_busy(&output) {
                    Ok(Attempt::Busy(output.failure_reason()))
                } else {
                    Err(Error::Tool {
                        tool: "hdiutil detach".to_string(),
                        reason: output.failure_reason(),
                    })
                }
            }
        })
        .await?;

        self.mounted = false;
        Ok(())
    }

    /// Releases everything: detaches if still mounted, then deletes the
    /// intermediate image and the staging directory.
    ///
    /// Used on error paths; failures are logged rather than returned so the
    /// original error is what the caller sees.
    pub async fn discard<R: ToolRunner>(mut self, runner: &R, policy: &RetryPolicy) {
        if let Err(e) = self.detach(runner, policy).await {
            log::warn!("Failed to detach {}: {}", self.mount_point.display(), e);
        }
        self.intermediates.remove().await;
    }

    /// Gives up on a volume whose [`detach`](Self::detach) already ran out of
    /// retries: one more forced detach, then the intermediates are deleted.
    pub(crate) async fn abandon<R: ToolRunner>(mut self, runner: &R) {
        if self.mounted {
            match detach_command(&self.mount_point, true) {
                Ok(command) => match runner.run(&command).await {
                    Ok(output) if output.success() => {}
                    Ok(output) => log::warn!(
                        "Leaving {} mounted: {}",
                        self.mount_point.display(),
                        output.failure_reason()
                    ),
                    Err(e) => log::warn!("Leaving {} mounted: {}", self.mount_point.display(), e),
                },
                Err(e) => log::warn!("Leaving {} mounted: {}", self.mount_point.display(), e),
            }
            self.mounted = false;
        }
        self.intermediates.remove().await;
    }

    /// Deletes the intermediate image and staging directory. The volume must
    /// already be detached.
    pub(crate) async fn remove_intermediates(&mut self) {
        self.intermediates.remove().await;
    }
}

impl Drop for MountedVolume {
    fn drop(&mut self) {
        if self.mounted {
            log::warn!("Detaching volume `{}` of an interrupted DMG build", self.name);
            force_detach_blocking(&self.mount_point);
        }
    }
}

fn detach_command(mount_point: &Path, force: bool) -> Result<ToolCommand> {
    let command = ToolCommand::new("hdiutil").arg("detach").path_arg(mount_point)?;
    Ok(if force { command.arg("-force") } else { command })
}

/// Synchronous `hdiutil detach -force` for drop paths, bounded by
/// [`DROP_DETACH_TIMEOUT`].
pub(crate) fn force_detach_blocking(mount_point: &Path) {
    use wait_timeout::ChildExt;

    let child = std::process::Command::new("hdiutil")
        .arg("detach")
        .arg(mount_point)
        .arg("-force")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            log::warn!("Could not run hdiutil to detach {}: {}", mount_point.display(), e);
            return;
        }
    };

    match child.wait_timeout(DROP_DETACH_TIMEOUT) {
        Ok(Some(status)) if status.success() => {
            log::info!("Detached {}", mount_point.display());
        }
        Ok(Some(status)) => {
            log::warn!("hdiutil detach {} exited with {}", mount_point.display(), status);
        }
        Ok(None) => {
            log::warn!(
                "hdiutil detach {} did not finish within {:?}; giving up",
                mount_point.display(),
                DROP_DETACH_TIMEOUT
            );
            let _ = child.kill();
            let _ = child.wait();
        }
        Err(e) => {
            log::warn!("Failed to wait for hdiutil detach: {}", e);
        }
    }
}
