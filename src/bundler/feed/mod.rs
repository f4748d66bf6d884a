//! Appcast feed reconciliation.
//!
//! - [`model`] - [`Feed`] and [`FeedItem`] with upsert and ordering
//! - [`version`] - Version sort keys
//! - [`xml`] - Reading and writing the RSS document
//! - [`notes`] - Release notes rendering
//! - [`store`] - [`FeedStore`], tying the above to a [`ReleaseConfig`](crate::bundler::ReleaseConfig)

pub mod model;
pub mod notes;
pub mod store;
pub mod version;
pub mod xml;

pub use model::{DEFAULT_ENCLOSURE_TYPE, Feed, FeedItem};
pub use notes::render_release_notes;
pub use store::FeedStore;
pub use version::VersionKey;
