//! DMG packaging, appcast maintenance and release publishing.
//!
//! The bundler is organised the way a release flows:
//!
//! - [`settings`] - configuration loading and the immutable [`ReleaseConfig`]
//! - [`platform`] - the macOS DMG assembler (stage, create, lay out, compress)
//! - [`feed`] - the Sparkle appcast model, its XML form and release notes
//! - [`publish`] - idempotent uploads over rsync or scp
//! - [`builder`] - the [`Pipeline`] tying the stages together
//! - [`utils`] - filesystem, process, retry and locking helpers
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_appcast::bundler::{ConfigFile, Pipeline, ReleaseConfigBuilder, SystemRunner};
//!
//! # async fn example() -> kodegen_bundler_appcast::bundler::Result<()> {
//! let config = ReleaseConfigBuilder::new(".")
//!     .config_file(ConfigFile::default())
//!     .build()?;
//!
//! let runner = SystemRunner;
//! let pipeline = Pipeline::new(&config, &runner);
//! let artifacts = pipeline.assemble().await?;
//! let feed = pipeline.update_feed(&artifacts).await?;
//! println!("feed now lists {} release(s)", feed.items().len());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod feed;
pub mod platform;
pub mod publish;
pub mod settings;
pub mod utils;

use serde::Serialize;
use std::path::{Path, PathBuf};

pub use builder::{Pipeline, calculate_sha256};
pub use error::{Error, ErrorExt, Result};
pub use feed::{Feed, FeedItem, FeedStore, VersionKey};
pub use platform::macos::dmg::{
    CompressedImage, DmgAssembler, FinderLayout, LayoutApplier, LayoutPlan, MountedVolume,
    StagedEntry, StagingDir,
};
pub use publish::{ArtifactOutcome, PublishReport, PublishTransport, UploadStatus, resolve_artifacts};
pub use settings::{
    AppcastSettings, BundleInfo, ConfigFile, DmgLayout, EnclosureUrlStyle, FileEntry, FileSource,
    NamedTarget, PackageSettings, Position, ProjectType, ReleaseConfig, ReleaseConfigBuilder,
    TransportProtocol, TransportTarget, VersionOrdering,
};
pub use utils::{RetryPolicy, RunLock, SystemRunner, ToolCommand, ToolOutput, ToolRunner};

/// Files one release produces and publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    /// Compressed, distributable DMG
    pub disk_image: PathBuf,
    /// Appcast feed XML
    pub feed_file: PathBuf,
    /// Stand-alone HTML release notes of the latest release
    pub release_notes_file: PathBuf,
}

impl ArtifactSet {
    /// All artifact paths in upload order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        [
            self.disk_image.as_path(),
            self.feed_file.as_path(),
            self.release_notes_file.as_path(),
        ]
        .into_iter()
    }

    /// Paths that are not existing regular files.
    pub fn missing(&self) -> Vec<&Path> {
        self.paths().filter(|path| !path.is_file()).collect()
    }

    /// Replaces the feed file, e.g. when publishing a feed from another location.
    pub fn with_feed_file(mut self, feed_file: impl Into<PathBuf>) -> Self {
        self.feed_file = feed_file.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_absent_files_in_upload_order() {
        let dir = tempfile::tempdir().unwrap();
        let feed = dir.path().join("feed.xml");
        std::fs::write(&feed, "<rss/>").unwrap();

        let artifacts = ArtifactSet {
            disk_image: dir.path().join("MyApp-1.0.dmg"),
            feed_file: feed,
            release_notes_file: dir.path().join("release_notes.html"),
        };

        let missing = artifacts.missing();
        assert_eq!(missing.len(), 2);
        assert!(missing[0].ends_with("MyApp-1.0.dmg"));
        assert!(missing[1].ends_with("release_notes.html"));
    }

    #[test]
    fn with_feed_file_swaps_only_the_feed() {
        let artifacts = ArtifactSet {
            disk_image: "a.dmg".into(),
            feed_file: "feed.xml".into(),
            release_notes_file: "notes.html".into(),
        }
        .with_feed_file("/elsewhere/feed.xml");

        let paths: Vec<&Path> = artifacts.paths().collect();
        assert_eq!(
            paths,
            vec![
                Path::new("a.dmg"),
                Path::new("/elsewhere/feed.xml"),
                Path::new("notes.html")
            ]
        );
    }
}
