//! Drop-time removal of a build's transient files.
//!
//! The staging directory exists from staging on and the read-write image from
//! `hdiutil create` on. [`Intermediates`] owns both paths through every later
//! step and is handed from [`StagingDir`](super::StagingDir) to
//! [`MountedVolume`](super::MountedVolume), so a build future dropped at any
//! await point still deletes them.

use crate::bundler::utils::fs;
use std::{
    io,
    path::{Path, PathBuf},
};

/// Staging directory and, once created, the read-write image of one build.
#[derive(Debug)]
pub(crate) struct Intermediates {
    staging_dir: PathBuf,
    image: Option<PathBuf>,
    armed: bool,
}

impl Intermediates {
    pub(crate) fn new(staging_dir: PathBuf) -> Self {
        Self {
            staging_dir,
            image: None,
            armed: true,
        }
    }

    pub(crate) fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Claims `image` before `hdiutil create` starts writing it.
    pub(crate) fn track_image(&mut self, image: PathBuf) {
        self.image = Some(image);
    }

    /// Deletes the image and the staging directory and disarms the guard.
    pub(crate) async fn remove(&mut self) {
        if let Some(image) = &self.image {
            if let Err(e) = fs::remove_file(image).await {
                log::warn!("Failed to remove {}: {}", image.display(), e);
            }
        }
        if let Err(e) = fs::remove_dir_all(&self.staging_dir).await {
            log::warn!("Failed to remove {}: {}", self.staging_dir.display(), e);
        }
        self.armed = false;
    }
}

impl Drop for Intermediates {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        log::warn!(
            "Removing intermediates of an interrupted DMG build in {}",
            self.staging_dir.display()
        );
        if let Some(image) = &self.image {
            warn_unless_missing(std::fs::remove_file(image), image);
        }
        warn_unless_missing(std::fs::remove_dir_all(&self.staging_dir), &self.staging_dir);
    }
}

fn warn_unless_missing(result: io::Result<()>, path: &Path) {
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
        _ => {}
    }
}
