//! Release pipeline orchestration.
//!
//! This module provides the [`Pipeline`] orchestrator that runs the three
//! release stages in a fixed order: assemble → update feed → publish.

use crate::bundler::{
    ArtifactSet,
    error::{Error, Result},
    feed::{Feed, FeedStore},
    platform::macos::dmg::DmgAssembler,
    publish::{PublishReport, PublishTransport},
    settings::{ReleaseConfig, TransportTarget},
    utils::{RunLock, ToolRunner},
};
use std::path::Path;

const ASSEMBLE: &str = "assemble";
const UPDATE_FEED: &str = "update-feed";
const PUBLISH: &str = "publish";

/// Main release orchestrator.
///
/// Borrows an immutable [`ReleaseConfig`] and a [`ToolRunner`]. Every entry
/// point holds the run lock for its duration, so two runs never touch the
/// same volume name or feed file at once. Errors are wrapped with the stage
/// they happened in.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_appcast::bundler::{Pipeline, ReleaseConfig, SystemRunner};
///
/// # async fn example(config: ReleaseConfig) -> kodegen_bundler_appcast::bundler::Result<()> {
/// let runner = SystemRunner;
/// let report = Pipeline::new(&config, &runner).run().await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Pipeline<'a, R: ToolRunner> {
    config: &'a ReleaseConfig,
    runner: &'a R,
}

impl<'a, R: ToolRunner> Pipeline<'a, R> {
    pub fn new(config: &'a ReleaseConfig, runner: &'a R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &ReleaseConfig {
        self.config
    }

    fn lock(&self) -> Result<RunLock> {
        RunLock::acquire(&self.config.lock_path())
    }

    /// Builds the DMG.
    ///
    /// # Returns
    ///
    /// The [`ArtifactSet`] later stages read from and publish.
    pub async fn assemble(&self) -> Result<ArtifactSet> {
        let _lock = self.lock().map_err(|e| e.in_stage(ASSEMBLE))?;
        self.assemble_locked().await
    }

    /// Upserts the current release into the feed and writes the release
    /// notes.
    pub async fn update_feed(&self, artifacts: &ArtifactSet) -> Result<Feed> {
        let _lock = self.lock().map_err(|e| e.in_stage(UPDATE_FEED))?;
        self.update_feed_locked(artifacts).await
    }

    /// Uploads the artifacts, with `feed_path` as the feed file, to `target`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when an artifact is missing,
    /// [`Error::Transport`] when any upload failed. All artifacts are
    /// attempted either way.
    pub async fn publish(
        &self,
        artifacts: &ArtifactSet,
        feed_path: &Path,
        target: &TransportTarget,
    ) -> Result<PublishReport> {
        let _lock = self.lock().map_err(|e| e.in_stage(PUBLISH))?;
        self.publish_locked(artifacts, feed_path, target).await
    }

    /// Runs assemble, update feed and publish in order, stopping at the
    /// first failure.
    pub async fn run(&self) -> Result<PublishReport> {
        let target = self.config.transport()?;
        let _lock = self.lock()?;

        log::info!("Releasing {}", self.config.package().pkg_name());
        let artifacts = self.assemble_locked().await?;
        self.update_feed_locked(&artifacts).await?;
        let report = self
            .publish_locked(&artifacts, &artifacts.feed_file, target)
            .await?;

        log::info!("✓ Released {}", self.config.package().pkg_name());
        Ok(report)
    }

    async fn assemble_locked(&self) -> Result<ArtifactSet> {
        DmgAssembler::new(self.config, self.runner)
            .assemble()
            .await
            .map_err(|e| e.in_stage(ASSEMBLE))?;
        Ok(self.config.artifact_set())
    }

    async fn update_feed_locked(&self, artifacts: &ArtifactSet) -> Result<Feed> {
        FeedStore::new(self.config)
            .update(artifacts)
            .await
            .map_err(|e| e.in_stage(UPDATE_FEED))
    }

    async fn publish_locked(
        &self,
        artifacts: &ArtifactSet,
        feed_path: &Path,
        target: &TransportTarget,
    ) -> Result<PublishReport> {
        let artifacts = artifacts.clone().with_feed_file(feed_path);
        let missing = artifacts.missing();
        if !missing.is_empty() {
            let missing: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(Error::config(format!(
                "missing artifact(s) to publish: {}",
                missing.join(", ")
            ))
            .in_stage(PUBLISH));
        }

        let report = PublishTransport::new(self.runner, target)
            .upload(&artifacts)
            .await
            .map_err(|e| e.in_stage(PUBLISH))?;
        log::info!("{}", report);

        report.into_result().map_err(|e| e.in_stage(PUBLISH))
    }
}
