//! Finalization: detach, compress, clean up.
//!
//! Layout changes only persist in a read-write image, but the distributable
//! should be compressed and read-only. The writable image is therefore
//! detached first and then converted to UDZO.

use super::volume::MountedVolume;
use crate::bundler::{
    error::Result,
    utils::{RetryPolicy, ToolCommand, ToolRunner, fs, run_checked},
};
use std::path::{Path, PathBuf};

/// The distributable, compressed read-only image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// Detaches `volume`, converts its image to UDZO at `output` and removes the
/// intermediate image and staging directory.
///
/// # Process
/// 1. `hdiutil detach`, retried while busy
/// 2. `hdiutil convert -format UDZO`
/// 3. Remove the read-write image and the staging directory
///
/// Any failure still releases the volume before the error is returned. A
/// detach that ran out of retries gets one more forced attempt, not a second
/// retry loop.
pub async fn finalize<R: ToolRunner>(
    runner: &R,
    policy: &RetryPolicy,
    mut volume: MountedVolume,
    output: &Path,
) -> Result<CompressedImage> {
    if let Err(e) = volume.detach(runner, policy).await {
        volume.abandon(runner).await;
        return Err(e);
    }

    if let Err(e) = convert(runner, volume.image(), output).await {
        volume.discard(runner, policy).await;
        return Err(e);
    }

    volume.remove_intermediates().await;

    let size = tokio::fs::metadata(output)
        .await
        .map_err(crate::bundler::Error::IoError)?
        .len();
    log::info!("✓ Created {} ({} bytes)", output.display(), size);

    Ok(CompressedImage {
        path: output.to_path_buf(),
        size,
    })
}

/// Convert read-write DMG (UDRW) to compressed read-only (UDZO)
async fn convert<R: ToolRunner>(runner: &R, image: &Path, output: &Path) -> Result<()> {
    log::info!("Converting DMG to compressed format...");

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent, false).await?;
    }
    fs::remove_file(output).await?;

    let command = ToolCommand::new("hdiutil")
        .arg("convert")
        .path_arg(image)?
        .args(["-format", "UDZO", "-imagekey", "zlib-level=9", "-o"])
        .path_arg(output)?;

    run_checked(runner, &command).await?;
    Ok(())
}
