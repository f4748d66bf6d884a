//! Feed data model and upsert semantics.

use super::version::VersionKey;
use crate::bundler::{error::Result, settings::VersionOrdering};
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;

/// Media type of the DMG enclosure.
pub const DEFAULT_ENCLOSURE_TYPE: &str = "application/octet-stream";

/// One release in the feed. Unique by `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub version: String,
    pub title: String,
    pub published_at: DateTime<FixedOffset>,
    pub enclosure_url: String,
    /// Size of the downloadable artifact in bytes
    pub enclosure_length: u64,
    pub enclosure_type: String,
    pub release_notes_html: String,
    pub minimum_system_version: Option<String>,
    /// Non-permalink identifier, `{name}-{version}` for new items
    pub guid: Option<String>,
}

/// A release feed: channel metadata plus items, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub title: String,
    pub link: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    items: Vec<FeedItem>,
}

impl Feed {
    /// An empty feed titled `title`.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: None,
            description: None,
            language: None,
            items: Vec::new(),
        }
    }

    /// Builds a feed from parsed parts, keeping the item order as found.
    pub(crate) fn from_parts(
        title: String,
        link: Option<String>,
        description: Option<String>,
        language: Option<String>,
        items: Vec<FeedItem>,
    ) -> Self {
        Self {
            title,
            link,
            description,
            language,
            items,
        }
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Newest item, i.e. the first one after sorting.
    pub fn latest(&self) -> Option<&FeedItem> {
        self.items.first()
    }

    pub fn get(&self, version: &str) -> Option<&FeedItem> {
        self.items.iter().find(|item| item.version == version)
    }

    /// Inserts `item`, replacing any item with the same version, then
    /// re-sorts.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::bundler::Error::Config) when a version does
    /// not fit `ordering`.
    pub fn upsert(mut self, item: FeedItem, ordering: VersionOrdering) -> Result<Self> {
        // Validate before mutating so a bad version leaves the feed untouched.
        VersionKey::parse(&item.version, ordering)?;

        let before = self.items.len();
        self.items.retain(|existing| existing.version != item.version);
        if self.items.len() < before {
            log::debug!("Replacing feed item {}", item.version);
        }
        self.items.push(item);
        self.sort(ordering)?;
        Ok(self)
    }

    /// Sorts items descending by version, ties broken by publish time
    /// descending.
    pub fn sort(&mut self, ordering: VersionOrdering) -> Result<()> {
        let mut keyed = self
            .items
            .drain(..)
            .map(|item| Ok((VersionKey::parse(&item.version, ordering)?, item)))
            .collect::<Result<Vec<_>>>()?;

        keyed.sort_by(|(key_a, a), (key_b, b)| match key_b.cmp(key_a) {
            Ordering::Equal => b.published_at.cmp(&a.published_at),
            unequal => unequal,
        });

        self.items = keyed.into_iter().map(|(_, item)| item).collect();
        Ok(())
    }
}
