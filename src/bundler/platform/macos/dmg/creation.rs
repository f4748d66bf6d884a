//! Writable image creation and mounting using hdiutil.
//!
//! The staged folder becomes a read-write (UDRW) HFS+ image which is then
//! attached at `{mount_root}/{volume_name}` so its window can be laid out.

use super::{
    staging::StagingDir,
    volume::{MountedVolume, force_detach_blocking, is_busy},
};
use crate::bundler::{
    error::{Error, Result},
    settings::ReleaseConfig,
    utils::{Attempt, ToolCommand, ToolRunner, fs, retry_while_busy, run_checked},
};
use std::path::{Path, PathBuf};

/// Extra room on top of the staged content, in KiB.
const SLACK_KB: u64 = 20 * 1024;

/// Image size in KiB for `size_hint` bytes of content.
///
/// HFS+ metadata and Finder's `.DS_Store` need room beyond the raw file
/// sizes, so a fifth is added plus a fixed slack.
pub fn image_size_kb(size_hint: u64) -> u64 {
    let content_kb = size_hint.div_ceil(1024);
    content_kb + content_kb / 5 + SLACK_KB
}

/// Creates the writable image from `staging` and mounts it.
///
/// # Process
/// 1. `hdiutil create -format UDRW` from the staging folder
/// 2. `hdiutil attach -readwrite` at `{mount_root}/{volume_name}`, retrying
///    while the name is in use
///
/// On failure the partial image and the staging directory are removed
/// before the error is returned. If the returned future is dropped instead,
/// the same cleanup runs from the drop guards, including a forced detach
/// when an attach was already in flight.
pub async fn create_writable_image<R: ToolRunner>(
    config: &ReleaseConfig,
    runner: &R,
    staging: StagingDir,
    volume_name: &str,
    size_hint: u64,
) -> Result<MountedVolume> {
    let image = config.writable_image_path();
    let (mut intermediates, entries) = staging.into_parts();
    intermediates.track_image(image.clone());

    let created = create_image(
        runner,
        intermediates.staging_dir(),
        &image,
        volume_name,
        size_hint,
    )
    .await;
    let attached = match created {
        Ok(()) => attach(config, runner, &image, volume_name).await,
        Err(e) => Err(e),
    };

    match attached {
        Ok(mount_point) => {
            log::info!("✓ Mounted {} at {}", volume_name, mount_point.display());
            Ok(MountedVolume::new(
                volume_name.to_string(),
                mount_point,
                image,
                entries,
                intermediates,
            ))
        }
        Err(e) => {
            intermediates.remove().await;
            Err(e)
        }
    }
}

async fn create_image<R: ToolRunner>(
    runner: &R,
    staging_dir: &Path,
    image: &Path,
    volume_name: &str,
    size_hint: u64,
) -> Result<()> {
    if let Some(parent) = image.parent() {
        fs::create_dir_all(parent, false).await?;
    }
    fs::remove_file(image).await?;

    let size_kb = image_size_kb(size_hint);
    log::info!(
        "Creating writable DMG {} ({} KiB)...",
        image.display(),
        size_kb
    );

    let command = ToolCommand::new("hdiutil")
        .args(["create", "-ov", "-format", "UDRW", "-fs", "HFS+"])
        .arg("-volname")
        .arg(volume_name)
        .arg("-srcfolder")
        .path_arg(staging_dir)?
        .arg("-size")
        .arg(format!("{}k", size_kb))
        .path_arg(image)?;

    run_checked(runner, &command).await?;
    Ok(())
}

async fn attach<R: ToolRunner>(
    config: &ReleaseConfig,
    runner: &R,
    image: &Path,
    volume_name: &str,
) -> Result<PathBuf> {
    let mount_point = config.mount_root().join(volume_name);
    let resource = mount_point.display().to_string();

    let command = ToolCommand::new("hdiutil")
        .arg("attach")
        .path_arg(image)?
        .args(["-readwrite", "-noverify", "-noautoopen", "-mountpoint"])
        .path_arg(&mount_point)?;

    retry_while_busy(config.retry(), &resource, |_| {
        let command = command.clone();
        let mount_point = mount_point.clone();
        async move {
            if tokio::fs::symlink_metadata(&mount_point).await.is_ok() {
                return Ok(Attempt::Busy(format!(
                    "{} is already in use",
                    mount_point.display()
                )));
            }

            let pending = PendingAttach::new(mount_point.clone());
            let output = runner.run(&command).await;
            pending.settled();
            let output = output?;
            if output.success() {
                Ok(Attempt::Done(()))
            } else if is_busy(&output) {
                Ok(Attempt::Busy(output.failure_reason()))
            } else {
                Err(Error::Tool {
                    tool: "hdiutil attach".to_string(),
                    reason: output.failure_reason(),
                })
            }
        }
    })
    .await?;

    Ok(mount_point)
}

/// An `hdiutil attach` whose outcome is not known yet.
///
/// Dropped unsettled means the caller gave up mid-attach; the image may still
/// get mounted, so whatever appeared at the mount point is force-detached.
struct PendingAttach {
    mount_point: Option<PathBuf>,
}

impl PendingAttach {
    fn new(mount_point: PathBuf) -> Self {
        Self {
            mount_point: Some(mount_point),
        }
    }

    fn settled(mut self) {
        self.mount_point = None;
    }
}

impl Drop for PendingAttach {
    fn drop(&mut self) {
        if let Some(mount_point) = self.mount_point.take() {
            if mount_point.exists() {
                force_detach_blocking(&mount_point);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_has_slack() {
        assert_eq!(image_size_kb(0), SLACK_KB);
        assert_eq!(image_size_kb(10 * 1024 * 1024), 10 * 1024 + 2 * 1024 + SLACK_KB);
        assert_eq!(image_size_kb(1), 1 + SLACK_KB);
    }
}
