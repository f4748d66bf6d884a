//! Loading, updating and atomically saving the appcast feed.

use super::{
    model::{DEFAULT_ENCLOSURE_TYPE, Feed, FeedItem},
    notes, xml,
};
use crate::bundler::{
    ArtifactSet,
    error::{Error, ErrorExt, Result},
    settings::{EnclosureUrlStyle, ReleaseConfig},
    utils::fs,
};
use chrono::{SubsecRound, Utc};
use std::path::Path;

/// Reconciles the local feed file with the release being built.
///
/// # Example
/// ```no_run
/// use kodegen_bundler_appcast::bundler::{FeedStore, ReleaseConfig};
///
/// # async fn example(config: ReleaseConfig) -> kodegen_bundler_appcast::bundler::Result<()> {
/// let artifacts = config.artifact_set();
/// let feed = FeedStore::new(&config).update(&artifacts).await?;
/// println!("Latest: {:?}", feed.latest().map(|item| &item.version));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FeedStore<'a> {
    config: &'a ReleaseConfig,
}

impl<'a> FeedStore<'a> {
    pub fn new(config: &'a ReleaseConfig) -> Self {
        Self { config }
    }

    /// The feed a release starts from when no feed file exists yet.
    pub fn empty_feed(&self) -> Feed {
        let mut feed = Feed::new(self.config.name());
        feed.link = self.config.appcast().base_url().map(String::from);
        feed.description = Some(format!("{} updates", self.config.name()));
        feed.language = Some("en".to_string());
        feed
    }

    /// Reads the feed at `path`.
    ///
    /// A missing or empty file yields [`FeedStore::empty_feed`]. A file that
    /// is not a valid appcast fails with [`Error::Parse`].
    pub async fn load(&self, path: &Path) -> Result<Feed> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No feed at {}, starting a new one", path.display());
                return Ok(self.empty_feed());
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(Error::parse(path, "feed is not valid UTF-8"));
            }
            Err(e) => return Err(e).fs_context("reading feed", path),
        };

        if text.trim().is_empty() {
            log::info!("Feed {} is empty, starting a new one", path.display());
            return Ok(self.empty_feed());
        }

        let feed = xml::parse(&text, path)?;
        log::debug!("Loaded {} item(s) from {}", feed.items().len(), path.display());
        Ok(feed)
    }

    /// Renders the configured release notes source.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the source file does not exist.
    pub async fn render_release_notes(&self) -> Result<String> {
        let appcast = self.config.appcast();
        let source = appcast.release_notes_source();

        let markup = match tokio::fs::read_to_string(source).await {
            Ok(markup) => markup,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::config(format!(
                    "release notes source {} does not exist",
                    source.display()
                )));
            }
            Err(e) => return Err(e).fs_context("reading release notes", source),
        };

        notes::render_release_notes(&markup, appcast.release_notes_template()).await
    }

    /// Download URL of `file_name` according to the configured base URL and
    /// enclosure style.
    pub fn enclosure_url(&self, file_name: &str) -> Result<String> {
        let appcast = self.config.appcast();
        let base = appcast.base_url().ok_or_else(|| {
            Error::config(
                "no base URL for the feed enclosure: set `base_url` or SUFeedURL in Info.plist",
            )
        })?;
        let joined = format!("{}/{}", base.trim_end_matches('/'), file_name);

        match (appcast.enclosure_url_style, appcast.host()) {
            (EnclosureUrlStyle::HostRelative, Some(host)) => {
                let url = url::Url::parse(&joined)?;
                if url.host_str() == Some(host) {
                    let mut relative = url.path().to_string();
                    if let Some(query) = url.query() {
                        relative.push('?');
                        relative.push_str(query);
                    }
                    Ok(relative)
                } else {
                    Ok(joined)
                }
            }
            _ => Ok(joined),
        }
    }

    /// Builds the feed item for the current release.
    ///
    /// The enclosure length is the disk image's size on disk and the publish
    /// time is now, truncated to whole seconds.
    pub async fn build_item(&self, artifacts: &ArtifactSet) -> Result<FeedItem> {
        let config = self.config;
        let version = config.version().ok_or_else(|| {
            Error::config("no release version: set `version` or CFBundleVersion in Info.plist")
        })?;

        let image = &artifacts.disk_image;
        let enclosure_length = match tokio::fs::metadata(image).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::config(format!(
                    "disk image {} does not exist; assemble it first",
                    image.display()
                )));
            }
            Err(e) => return Err(e).fs_context("reading disk image size", image),
        };
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::config(format!("invalid disk image path {}", image.display())))?;

        Ok(FeedItem {
            version: version.to_string(),
            title: format!("{} {}", config.name(), version),
            published_at: Utc::now().trunc_subsecs(0).fixed_offset(),
            enclosure_url: self.enclosure_url(&file_name)?,
            enclosure_length,
            enclosure_type: DEFAULT_ENCLOSURE_TYPE.to_string(),
            release_notes_html: self.render_release_notes().await?,
            minimum_system_version: config.appcast().minimum_system_version.clone(),
            guid: Some(format!("{}-{}", config.name(), version)),
        })
    }

    /// Inserts or replaces `item` and re-sorts the feed.
    pub fn upsert(&self, feed: Feed, item: FeedItem) -> Result<Feed> {
        feed.upsert(item, self.config.appcast().version_ordering)
    }

    /// Writes `feed` to `path` atomically.
    pub async fn save(&self, feed: &Feed, path: &Path) -> Result<()> {
        fs::write_atomic(path, xml::serialize(feed)?).await
    }

    /// Loads the feed, upserts the current release, saves the feed and
    /// writes the latest release notes next to it.
    pub async fn update(&self, artifacts: &ArtifactSet) -> Result<Feed> {
        log::info!("Updating feed {}", artifacts.feed_file.display());

        let feed = self.load(&artifacts.feed_file).await?;
        let item = self.build_item(artifacts).await?;
        let version = item.version.clone();
        let feed = self.upsert(feed, item)?;

        self.save(&feed, &artifacts.feed_file).await?;

        if let Some(latest) = feed.latest() {
            fs::write_atomic(
                &artifacts.release_notes_file,
                latest.release_notes_html.clone().into_bytes(),
            )
            .await?;
        }

        log::info!(
            "✓ Feed updated with {} ({} item(s))",
            version,
            feed.items().len()
        );
        Ok(feed)
    }
}
