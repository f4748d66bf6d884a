//! Appcast feed and release notes settings.

use std::path::{Path, PathBuf};

/// How feed item versions are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrdering {
    /// Dot-separated numeric segments, optional `-prerelease` suffix.
    /// Versions that do not fit are rejected.
    #[default]
    Numeric,
    /// Plain string comparison. Only for feeds with free-form versions.
    Lexical,
}

/// Shape of the enclosure URL written into feed items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnclosureUrlStyle {
    /// `https://host/downloads/MyApp-1.0.dmg`
    #[default]
    Absolute,
    /// `/downloads/MyApp-1.0.dmg` when the URL is on the configured host.
    HostRelative,
}

/// Resolved appcast settings.
#[derive(Debug, Clone)]
pub struct AppcastSettings {
    /// Sparkle feed URL (`SUFeedURL`)
    pub feed_url: Option<String>,
    /// URL the feed and DMG are downloaded from; the feed URL's directory by default.
    pub base_url: Option<String>,
    /// Host of `base_url` unless set explicitly.
    pub host: Option<String>,
    /// File name of the feed, e.g. `my_feed.xml`.
    pub appcast_filename: String,
    /// Markup source of the release notes.
    pub release_notes_source: PathBuf,
    /// HTML template the rendered notes are inserted into.
    pub release_notes_template: Option<PathBuf>,
    /// File name of the published stand-alone release notes.
    pub release_notes_file_name: String,
    /// `sparkle:minimumSystemVersion` for new items.
    pub minimum_system_version: Option<String>,
    pub version_ordering: VersionOrdering,
    pub enclosure_url_style: EnclosureUrlStyle,
}

impl AppcastSettings {
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn release_notes_source(&self) -> &Path {
        &self.release_notes_source
    }

    pub fn release_notes_template(&self) -> Option<&Path> {
        self.release_notes_template.as_deref()
    }
}
