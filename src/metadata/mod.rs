//! Project metadata: `appcast.toml` and the application's `Info.plist`.

use crate::bundler::{
    BundleInfo, ConfigFile,
    error::{Error, ErrorExt, Result},
    utils::fs,
};
use std::path::Path;

/// Property list key holding the executable name.
pub const EXECUTABLE_KEY: &str = "CFBundleExecutable";
/// Property list key holding the build version.
pub const VERSION_KEY: &str = "CFBundleVersion";
/// Property list key holding the marketing version.
pub const SHORT_VERSION_KEY: &str = "CFBundleShortVersionString";
/// Property list key holding the Sparkle feed URL.
pub const FEED_URL_KEY: &str = "SUFeedURL";

/// Version component to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VersionPart {
    Major,
    Minor,
    Patch,
}

/// Loads `appcast.toml`.
///
/// A missing file yields the all-defaults configuration; a file that is not
/// valid TOML or has unknown keys is a configuration error.
pub async fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(ConfigFile::default());
        }
        Err(e) => return Err(e).fs_context("reading config file", path),
    };

    toml::from_str(&text)
        .map_err(|e| Error::config(format!("invalid {}: {}", path.display(), e)))
}

/// Reads name, version and feed URL from a property list.
///
/// Returns `None` when the file does not exist.
pub fn read_bundle_info(path: &Path) -> Result<Option<BundleInfo>> {
    if !path.exists() {
        log::debug!("No property list at {}", path.display());
        return Ok(None);
    }

    let dict = read_dictionary(path)?;
    let string = |key: &str| {
        dict.get(key)
            .and_then(plist::Value::as_string)
            .map(str::to_string)
    };

    Ok(Some(BundleInfo {
        executable: string(EXECUTABLE_KEY),
        version: string(VERSION_KEY),
        feed_url: string(FEED_URL_KEY),
    }))
}

/// Increments `part` of `CFBundleVersion`, and of
/// `CFBundleShortVersionString` when present, rewriting the property list.
///
/// # Returns
///
/// The new `CFBundleVersion`.
pub async fn bump_version(path: &Path, part: VersionPart) -> Result<String> {
    let mut dict = read_dictionary(path)?;

    let current = dict
        .get(VERSION_KEY)
        .and_then(plist::Value::as_string)
        .ok_or_else(|| {
            Error::config(format!("{} has no {}", path.display(), VERSION_KEY))
        })?;
    let next = bump(current, part)?;
    dict.insert(VERSION_KEY.to_string(), plist::Value::String(next.clone()));

    let short = dict
        .get(SHORT_VERSION_KEY)
        .and_then(plist::Value::as_string)
        .map(str::to_string);
    if let Some(short) = short {
        let bumped = bump(&short, part)?;
        dict.insert(SHORT_VERSION_KEY.to_string(), plist::Value::String(bumped));
    }

    let mut out = Vec::new();
    plist::Value::Dictionary(dict).to_writer_xml(&mut out)?;
    fs::write_atomic(path, out).await?;

    log::info!("✓ {} is now {}", VERSION_KEY, next);
    Ok(next)
}

/// Increments `part` of a dotted version, padding missing segments with zero.
///
/// Prerelease and build metadata are dropped.
pub fn bump(version: &str, part: VersionPart) -> Result<String> {
    let core = version
        .split(['-', '+'])
        .next()
        .unwrap_or_default()
        .trim();
    let mut segments: Vec<&str> = core.split('.').collect();
    if segments.len() > 3 {
        return Err(Error::config(format!(
            "cannot bump `{}`: more than three version segments",
            version
        )));
    }
    while segments.len() < 3 {
        segments.push("0");
    }

    let mut parsed = semver::Version::parse(&segments.join("."))
        .map_err(|e| Error::config(format!("cannot bump `{}`: {}", version, e)))?;

    match part {
        VersionPart::Major => {
            parsed.major += 1;
            parsed.minor = 0;
            parsed.patch = 0;
        }
        VersionPart::Minor => {
            parsed.minor += 1;
            parsed.patch = 0;
        }
        VersionPart::Patch => parsed.patch += 1,
    }
    Ok(parsed.to_string())
}

fn read_dictionary(path: &Path) -> Result<plist::Dictionary> {
    let value = plist::Value::from_file(path)
        .map_err(|e| Error::parse(path, e.to_string()))?;
    value
        .into_dictionary()
        .ok_or_else(|| Error::parse(path, "top-level value is not a dictionary"))
}
