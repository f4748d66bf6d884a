//! macOS DMG disk image assembler.
//!
//! Creates drag-to-install DMG files with a fixed window layout using the
//! native hdiutil tool. The DMG holds the configured files, optional `.webloc`
//! shortcuts and an Applications symlink.
//!
//! # Architecture
//!
//! This module is organized into logical submodules:
//! - `staging` - Resolving layout entries and staging them in a folder
//! - `creation` - Writable image creation and mounting using hdiutil
//! - `volume` - The mounted volume and its guaranteed release
//! - `cleanup` - Drop guard for the staging directory and read-write image
//! - `customization` - Window appearance (background, icons, positions)
//! - `conversion` - Detach and format conversion (UDRW → UDZO)

mod cleanup;
mod conversion;
mod creation;
mod customization;
mod staging;
mod volume;

use crate::bundler::{
    error::Result,
    settings::{DmgLayout, ReleaseConfig},
    utils::{ToolRunner, fs},
};
use std::path::Path;

pub use conversion::CompressedImage;
pub use creation::image_size_kb;
pub use customization::{
    BACKGROUND_DIR, FinderLayout, IconPlacement, LayoutApplier, LayoutPlan, VOLUME_ICON_FILE,
};
pub use staging::{APPLICATIONS_LINK, StagedEntry, StagingDir};
pub use volume::MountedVolume;

/// Builds the distributable DMG for one release.
///
/// Borrows the release configuration and a [`ToolRunner`]; the window layout
/// is applied through `L`, [`FinderLayout`] by default.
///
/// # Example
/// ```no_run
/// use kodegen_bundler_appcast::bundler::{DmgAssembler, ReleaseConfig, SystemRunner};
///
/// # async fn example(config: ReleaseConfig) -> kodegen_bundler_appcast::bundler::Result<()> {
/// let runner = SystemRunner;
/// let image = DmgAssembler::new(&config, &runner).assemble().await?;
/// println!("Created DMG: {} ({} bytes)", image.path.display(), image.size);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DmgAssembler<'a, R: ToolRunner, L: LayoutApplier = FinderLayout<'a, R>> {
    config: &'a ReleaseConfig,
    runner: &'a R,
    applier: L,
}

impl<'a, R: ToolRunner> DmgAssembler<'a, R> {
    pub fn new(config: &'a ReleaseConfig, runner: &'a R) -> Self {
        Self {
            config,
            runner,
            applier: FinderLayout::new(runner),
        }
    }
}

impl<'a, R: ToolRunner, L: LayoutApplier> DmgAssembler<'a, R, L> {
    /// Replaces the layout mechanism.
    pub fn with_applier<A: LayoutApplier>(self, applier: A) -> DmgAssembler<'a, R, A> {
        DmgAssembler {
            config: self.config,
            runner: self.runner,
            applier,
        }
    }

    /// Copies every layout entry into a fresh staging directory.
    ///
    /// Fails with a configuration error when a source is missing or two
    /// entries resolve to the same name; nothing is staged in that case.
    pub async fn stage(&self, layout: &DmgLayout, source_dir: &Path) -> Result<StagingDir> {
        staging::stage(self.config, layout, source_dir).await
    }

    /// Creates the read-write image from `staging` and mounts it as
    /// `volume_name`.
    pub async fn create_writable_image(
        &self,
        staging: StagingDir,
        volume_name: &str,
        size_hint: u64,
    ) -> Result<MountedVolume> {
        creation::create_writable_image(self.config, self.runner, staging, volume_name, size_hint)
            .await
    }

    /// Lays out the mounted volume's window.
    pub async fn apply_layout(
        &self,
        volume: &MountedVolume,
        layout: &DmgLayout,
    ) -> Result<LayoutPlan> {
        let plan =
            customization::apply_layout(self.runner, &self.applier, volume, layout).await?;

        // Finder writes .DS_Store asynchronously
        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        Ok(plan)
    }

    /// Detaches, compresses to `output` and removes the intermediates.
    pub async fn finalize(&self, volume: MountedVolume, output: &Path) -> Result<CompressedImage> {
        conversion::finalize(self.runner, self.config.retry(), volume, output).await
    }

    /// Runs every step: stage, create and mount, lay out, finalize.
    ///
    /// # Returns
    /// The compressed image at [`ReleaseConfig::package_path`].
    pub async fn assemble(&self) -> Result<CompressedImage> {
        let config = self.config;
        let layout = config.layout();
        log::info!("Creating DMG for {}", config.name());

        let staging = self.stage(layout, config.project_dir()).await?;
        let size_hint = match fs::dir_size(staging.path()).await {
            Ok(size) => size,
            Err(e) => {
                staging.discard().await;
                return Err(e);
            }
        };

        let volume = self
            .create_writable_image(staging, config.volume_name(), size_hint)
            .await?;

        if let Err(e) = self.apply_layout(&volume, layout).await {
            volume.discard(self.runner, config.retry()).await;
            return Err(e);
        }

        self.finalize(volume, &config.package_path()).await
    }
}
