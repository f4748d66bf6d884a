//! Unresolved configuration as read from `appcast.toml` and `Info.plist`.
//!
//! # Example `appcast.toml`
//!
//! ```toml
//! base_url = "https://downloads.example.com/myapp"
//! remote_dir = "/srv/www/downloads/myapp"
//! user = "deploy"
//! transport = "scp"
//! transport_args = ["-P", "2222"]
//!
//! [dmg]
//! background_file = "assets/dmg-background.png"
//! icon_size = 96
//! icon_text_size = "12 px"
//!
//! [[dmg.files]]
//! path = "README.txt"
//! position = [400, 65]
//!
//! [[dmg.files]]
//! link = "https://github.com/example/myapp"
//! name = "Github"
//! position = [400, 180]
//! ```

use super::{EnclosureUrlStyle, Position, TransportProtocol, VersionOrdering};
use serde::Deserialize;
use std::path::PathBuf;

/// Top level of `appcast.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub version: Option<String>,
    pub build_type: Option<String>,
    pub info_plist: Option<PathBuf>,
    pub build_products: Option<PathBuf>,
    pub dmg_src_folder: Option<PathBuf>,
    pub build_path: Option<PathBuf>,
    pub mountpoint: Option<PathBuf>,

    pub su_feed_url: Option<String>,
    pub base_url: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub remote_dir: Option<String>,
    pub appcast_filename: Option<String>,
    pub release_notes: Option<PathBuf>,
    pub release_notes_template: Option<PathBuf>,
    pub release_notes_html: Option<String>,
    pub minimum_system_version: Option<String>,
    pub version_ordering: Option<VersionOrdering>,
    pub enclosure_url: Option<EnclosureUrlStyle>,

    pub transport: Option<TransportProtocol>,
    pub transport_args: Option<Vec<String>>,

    pub dmg: DmgSection,
    pub retry: RetrySection,
}

/// Which defaults the DMG layout starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    /// Application bundle plus an `Applications` shortcut.
    #[default]
    Application,
    /// Only the configured files.
    Custom,
}

/// Icon label size, given as `12`, `"12"` or `"12 px"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IconTextSize {
    Pixels(u32),
    Text(String),
}

impl IconTextSize {
    /// Numeric value; `None` when the text holds no leading number.
    pub fn pixels(&self) -> Option<u32> {
        match self {
            Self::Pixels(px) => Some(*px),
            Self::Text(text) => {
                let digits: String = text
                    .trim()
                    .chars()
                    .take_while(char::is_ascii_digit)
                    .collect();
                digits.parse().ok()
            }
        }
    }
}

/// `[dmg]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DmgSection {
    pub project_type: ProjectType,
    pub background_file: Option<PathBuf>,
    pub volume_icon: Option<PathBuf>,
    pub icon_size: Option<u32>,
    pub icon_text_size: Option<IconTextSize>,
    pub window_size: Option<[u32; 2]>,
    pub app_icon_position: Option<Position>,
    pub applications_icon_position: Option<Position>,
    /// `.icns` shown on the `Applications` shortcut instead of the folder icon
    pub applications_icon: Option<PathBuf>,
    pub files: Vec<FileSection>,
}

/// One `[[dmg.files]]` entry. Exactly one of `path`, `glob`, `target` or
/// `link` selects the source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSection {
    pub path: Option<PathBuf>,
    pub glob: Option<String>,
    /// `bundle` or `root`
    pub target: Option<String>,
    pub link: Option<String>,
    pub position: Option<Position>,
    pub name: Option<String>,
    pub exclude: Vec<String>,
}

/// `[retry]` section for mount/unmount backoff.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
}

/// Values read from the application's property list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleInfo {
    /// `CFBundleExecutable`
    pub executable: Option<String>,
    /// `CFBundleVersion`
    pub version: Option<String>,
    /// `SUFeedURL`
    pub feed_url: Option<String>,
}
