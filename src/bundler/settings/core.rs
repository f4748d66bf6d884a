//! Resolved release configuration.

use super::{AppcastSettings, DmgLayout, PackageSettings, TransportTarget};
use crate::bundler::{
    ArtifactSet,
    error::{Error, Result},
    utils::RetryPolicy,
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Immutable settings for one release run.
///
/// Constructed once by [`ReleaseConfigBuilder`](super::ReleaseConfigBuilder)
/// with every default already resolved, then shared by reference with the
/// assembler, the feed store and the publisher.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub(super) package: PackageSettings,
    pub(super) build_type: String,
    pub(super) project_dir: PathBuf,
    pub(super) info_plist: PathBuf,
    pub(super) build_products: PathBuf,
    pub(super) staging_dir: PathBuf,
    pub(super) output_dir: PathBuf,
    pub(super) mount_root: PathBuf,
    pub(super) layout: DmgLayout,
    pub(super) appcast: AppcastSettings,
    pub(super) transport: Option<TransportTarget>,
    pub(super) retry: RetryPolicy,
    pub(super) settle_delay: Duration,
}

impl ReleaseConfig {
    pub fn package(&self) -> &PackageSettings {
        &self.package
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Release version, if known.
    pub fn version(&self) -> Option<&str> {
        self.package.version.as_deref()
    }

    /// Build type (`Release`, `Debug`, ...). Only used to build paths.
    pub fn build_type(&self) -> &str {
        &self.build_type
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn info_plist(&self) -> &Path {
        &self.info_plist
    }

    /// Directory holding the built products, `build/{build_type}` by default.
    pub fn build_products(&self) -> &Path {
        &self.build_products
    }

    /// Folder files are staged in before image creation.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Directory receiving the DMG, the feed and the release notes.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory volumes are mounted under, `/Volumes` by default.
    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    /// Name of the mounted volume.
    pub fn volume_name(&self) -> &str {
        &self.package.name
    }

    /// Mount point of the writable volume.
    pub fn volume_path(&self) -> PathBuf {
        self.mount_root.join(self.volume_name())
    }

    pub fn layout(&self) -> &DmgLayout {
        &self.layout
    }

    pub fn appcast(&self) -> &AppcastSettings {
        &self.appcast
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Pause after layout scripting so Finder can flush `.DS_Store`.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Publish target.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when no remote directory or host is configured.
    pub fn transport(&self) -> Result<&TransportTarget> {
        self.transport.as_ref().ok_or_else(|| {
            Error::config(
                "no publish target: set `remote_dir` and `host` (or a base URL to derive the host from)",
            )
        })
    }

    /// Path of the distributable DMG.
    pub fn package_path(&self) -> PathBuf {
        self.output_dir.join(self.package.pkg_name())
    }

    /// Path of the intermediate read-write image.
    pub fn writable_image_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}-rw.dmg", self.package.safe_name()))
    }

    /// Path of the local appcast feed.
    pub fn feed_path(&self) -> PathBuf {
        self.output_dir.join(&self.appcast.appcast_filename)
    }

    /// Path of the stand-alone release notes.
    pub fn release_notes_path(&self) -> PathBuf {
        self.output_dir.join(&self.appcast.release_notes_file_name)
    }

    /// Path of the run lock.
    pub fn lock_path(&self) -> PathBuf {
        self.output_dir
            .join(format!(".{}.lock", self.package.safe_name()))
    }

    /// Artifact paths this configuration produces.
    pub fn artifact_set(&self) -> ArtifactSet {
        ArtifactSet {
            disk_image: self.package_path(),
            feed_file: self.feed_path(),
            release_notes_file: self.release_notes_path(),
        }
    }
}
