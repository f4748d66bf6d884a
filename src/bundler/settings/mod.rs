//! Configuration for a release run.
//!
//! Raw values come from `appcast.toml` ([`ConfigFile`]) and the app's
//! `Info.plist` ([`BundleInfo`]). [`ReleaseConfigBuilder`] resolves every
//! default once into an immutable [`ReleaseConfig`].

mod appcast;
mod builder;
mod core;
mod file;
pub mod layout;
mod package;
mod transport;

pub use appcast::{AppcastSettings, EnclosureUrlStyle, VersionOrdering};
pub use builder::ReleaseConfigBuilder;
pub use core::ReleaseConfig;
pub use file::{
    BundleInfo, ConfigFile, DmgSection, FileSection, IconTextSize, ProjectType, RetrySection,
};
pub use layout::{
    DmgLayout, DynamicResolver, FileEntry, FileSource, NamedTarget, Position, ResolveContext,
};
pub use package::PackageSettings;
pub use transport::{TransportProtocol, TransportTarget};
