//! Builder resolving every default into a [`ReleaseConfig`].

use super::{
    AppcastSettings, BundleInfo, ConfigFile, DmgLayout, FileEntry, FileSection, FileSource,
    NamedTarget, PackageSettings, Position, ProjectType, ReleaseConfig, TransportTarget,
    layout::DynamicResolver,
};
use crate::bundler::{
    error::{Error, Result},
    utils::RetryPolicy,
};
use path_absolutize::Absolutize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

const DEFAULT_BUILD_TYPE: &str = "Release";
const DEFAULT_APPCAST_FILENAME: &str = "my_feed.xml";
const EXECUTABLE_NAME_PLACEHOLDER: &str = "${EXECUTABLE_NAME}";
const DEFAULT_APP_ICON_POSITION: Position = Position::new(175, 65);
const DEFAULT_APPLICATIONS_POSITION: Position = Position::new(347, 270);
const DEFAULT_ICON_SIZE: u32 = 104;
const DEFAULT_ICON_TEXT_SIZE: u32 = 12;
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Builder for [`ReleaseConfig`].
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_appcast::bundler::{ConfigFile, ReleaseConfigBuilder};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let file: ConfigFile = toml::from_str(r#"
///     name = "MyApp"
///     version = "1.2.0"
///     base_url = "https://downloads.example.com/myapp"
///     remote_dir = "/srv/www/myapp"
/// "#)?;
///
/// let config = ReleaseConfigBuilder::new(".")
///     .config_file(file)
///     .build_type(std::env::var("BUILD_TYPE").ok())
///     .build()?;
///
/// assert_eq!(config.package().pkg_name(), "MyApp-1.2.0.dmg");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ReleaseConfigBuilder {
    project_dir: PathBuf,
    file: ConfigFile,
    bundle_info: Option<BundleInfo>,
    build_type: Option<String>,
}

impl ReleaseConfigBuilder {
    /// Starts a builder for the project rooted at `project_dir`.
    pub fn new<P: AsRef<Path>>(project_dir: P) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Sets values read from `appcast.toml`.
    pub fn config_file(mut self, file: ConfigFile) -> Self {
        self.file = file;
        self
    }

    /// Sets values read from the application's `Info.plist`.
    pub fn bundle_info(mut self, info: Option<BundleInfo>) -> Self {
        self.bundle_info = info;
        self
    }

    /// Overrides the build type (usually from `BUILD_TYPE`).
    pub fn build_type(mut self, build_type: Option<String>) -> Self {
        self.build_type = build_type.filter(|b| !b.trim().is_empty());
        self
    }

    /// Path of the property list this builder reads metadata from.
    pub fn info_plist_path(&self) -> PathBuf {
        self.resolve(
            self.file
                .info_plist
                .clone()
                .unwrap_or_else(|| PathBuf::from("Info.plist")),
        )
    }

    /// Resolves defaults and validates the result.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for file entries without a position, ambiguous
    /// sources, icon sizes outside 16–128 or an unparsable base URL.
    pub fn build(mut self) -> Result<ReleaseConfig> {
        let project_dir = self
            .project_dir
            .absolutize()
            .map_err(|e| Error::config(format!("invalid project directory: {}", e)))?
            .into_owned();
        self.project_dir = project_dir.clone();
        let info = self.bundle_info.clone().unwrap_or_default();
        let file = &self.file;

        let name = file
            .name
            .clone()
            .or_else(|| {
                info.executable
                    .clone()
                    .filter(|n| n != EXECUTABLE_NAME_PLACEHOLDER)
            })
            .or_else(|| {
                project_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::config("could not determine the application name"))?;
        let version = file.version.clone().or_else(|| info.version.clone());
        let package = PackageSettings::new(name, version);

        let build_type = self
            .build_type
            .clone()
            .or_else(|| file.build_type.clone())
            .unwrap_or_else(|| DEFAULT_BUILD_TYPE.to_string());

        let build_products = file
            .build_products
            .clone()
            .map(|p| self.resolve(p))
            .unwrap_or_else(|| project_dir.join("build").join(&build_type));
        let staging_dir = file
            .dmg_src_folder
            .clone()
            .map(|p| self.resolve(p))
            .unwrap_or_else(|| build_products.join("dmg"));
        let output_dir = file
            .build_path
            .clone()
            .map(|p| self.resolve(p))
            .unwrap_or_else(|| project_dir.join("appcast").join("build"));
        let mount_root = file
            .mountpoint
            .clone()
            .map(|p| self.resolve(p))
            .unwrap_or_else(|| PathBuf::from("/Volumes"));

        let appcast = self.appcast_settings(&info)?;
        let layout = self.layout()?;
        let transport = self.transport_target(appcast.host())?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            attempts: file.retry.attempts.unwrap_or(defaults.attempts).max(1),
            initial_delay: file
                .retry
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            max_delay: file
                .retry
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
        };
        let settle_delay = file
            .retry
            .settle_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SETTLE_DELAY);

        Ok(ReleaseConfig {
            package,
            build_type,
            info_plist: self.info_plist_path(),
            project_dir: project_dir.clone(),
            build_products,
            staging_dir,
            output_dir,
            mount_root,
            layout,
            appcast,
            transport,
            retry,
            settle_delay,
        })
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.project_dir.join(path)
        }
    }

    fn appcast_settings(&self, info: &BundleInfo) -> Result<AppcastSettings> {
        let file = &self.file;
        let feed_url = file.su_feed_url.clone().or_else(|| info.feed_url.clone());

        let base_url = file.base_url.clone().or_else(|| {
            feed_url
                .as_deref()
                .and_then(|url| url.rsplit_once('/'))
                .map(|(dir, _)| dir.to_string())
        });

        let host = match (&file.host, &base_url) {
            (Some(host), _) => Some(host.clone()),
            (None, Some(base)) => {
                let parsed = url::Url::parse(base)
                    .map_err(|e| Error::config(format!("invalid base URL `{}`: {}", base, e)))?;
                parsed.host_str().map(String::from)
            }
            (None, None) => None,
        };

        let appcast_filename = file
            .appcast_filename
            .clone()
            .or_else(|| {
                feed_url
                    .as_deref()
                    .and_then(|url| url.rsplit('/').next())
                    .filter(|name| !name.is_empty())
                    .map(String::from)
            })
            .unwrap_or_else(|| DEFAULT_APPCAST_FILENAME.to_string());

        Ok(AppcastSettings {
            feed_url,
            base_url,
            host,
            appcast_filename,
            release_notes_source: self.resolve(
                file.release_notes
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("release_notes.txt")),
            ),
            release_notes_template: Some(
                self.resolve(
                    file.release_notes_template
                        .clone()
                        .unwrap_or_else(|| PathBuf::from("release_notes_template.html")),
                ),
            ),
            release_notes_file_name: file
                .release_notes_html
                .clone()
                .unwrap_or_else(|| "release_notes.html".to_string()),
            minimum_system_version: file.minimum_system_version.clone(),
            version_ordering: file.version_ordering.unwrap_or_default(),
            enclosure_url_style: file.enclosure_url.unwrap_or_default(),
        })
    }

    fn layout(&self) -> Result<DmgLayout> {
        let dmg = &self.file.dmg;

        let mut entries = dmg
            .files
            .iter()
            .enumerate()
            .map(|(index, section)| file_entry(index, section))
            .collect::<Result<Vec<_>>>()?;

        let applications = match dmg.project_type {
            ProjectType::Application => {
                let has_bundle = entries.iter().any(|e| {
                    matches!(e.source, FileSource::NamedTarget(NamedTarget::TargetBundle))
                });
                if !has_bundle {
                    entries.insert(
                        0,
                        FileEntry::new(
                            FileSource::NamedTarget(NamedTarget::TargetBundle),
                            dmg.app_icon_position.unwrap_or(DEFAULT_APP_ICON_POSITION),
                        ),
                    );
                }
                Some(
                    dmg.applications_icon_position
                        .unwrap_or(DEFAULT_APPLICATIONS_POSITION),
                )
            }
            ProjectType::Custom => dmg.applications_icon_position,
        };

        let text_size = match &dmg.icon_text_size {
            Some(size) => size.pixels().ok_or_else(|| {
                Error::config(format!("icon_text_size {:?} is not a number", size))
            })?,
            None => DEFAULT_ICON_TEXT_SIZE,
        };

        let mut layout = DmgLayout::new(
            entries,
            dmg.icon_size.unwrap_or(DEFAULT_ICON_SIZE),
            text_size,
        )?
        .with_background(dmg.background_file.clone().map(|p| self.resolve(p)))
        .with_volume_icon(dmg.volume_icon.clone().map(|p| self.resolve(p)))
        .with_applications_link(applications);

        if let Some([width, height]) = dmg.window_size {
            layout = layout.with_window_size(width, height);
        }
        if let Some(icon) = &dmg.applications_icon {
            if applications.is_none() {
                return Err(Error::config(
                    "applications_icon is set but the DMG has no Applications shortcut",
                ));
            }
            layout = layout.with_applications_icon(Some(self.resolve(icon.clone())));
        }

        Ok(layout)
    }

    fn transport_target(&self, host: Option<&str>) -> Result<Option<TransportTarget>> {
        let file = &self.file;
        let Some(remote_dir) = file.remote_dir.clone() else {
            return Ok(None);
        };
        let Some(host) = host else {
            return Ok(None);
        };

        let protocol = file.transport.unwrap_or_default();
        let extra_args = file
            .transport_args
            .clone()
            .unwrap_or_else(|| protocol.default_args());

        Ok(Some(TransportTarget {
            protocol,
            host: host.to_string(),
            user: file.user.clone(),
            remote_dir,
            extra_args,
        }))
    }
}

fn file_entry(index: usize, section: &FileSection) -> Result<FileEntry> {
    let position = section.position.ok_or_else(|| {
        Error::config(format!(
            "dmg.files[{}]: `position = [x, y]` is missing",
            index
        ))
    })?;

    let mut sources = Vec::new();
    if let Some(path) = &section.path {
        sources.push(FileSource::StaticPath(path.clone()));
    }
    if let Some(pattern) = &section.glob {
        sources.push(FileSource::DynamicResolver(DynamicResolver::glob(
            pattern.clone(),
        )));
    }
    if let Some(target) = &section.target {
        let target = match target.as_str() {
            "bundle" | "target_bundle" => NamedTarget::TargetBundle,
            "root" | "." => NamedTarget::ProjectRoot,
            other => {
                return Err(Error::config(format!(
                    "dmg.files[{}]: unknown target `{}` (expected `bundle` or `root`)",
                    index, other
                )));
            }
        };
        sources.push(FileSource::NamedTarget(target));
    }
    if let Some(url) = &section.link {
        sources.push(FileSource::NamedTarget(NamedTarget::Link { url: url.clone() }));
    }

    if sources.len() != 1 {
        return Err(Error::config(format!(
            "dmg.files[{}]: exactly one of `path`, `glob`, `target` or `link` is required",
            index
        )));
    }
    let source = sources.remove(0);

    let mut entry = FileEntry::new(source, position).with_excludes(&section.exclude)?;
    if let Some(name) = &section.name {
        entry = entry.with_name(name.clone());
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::settings::{EnclosureUrlStyle, TransportProtocol};

    fn build(toml_text: &str, info: Option<BundleInfo>) -> Result<ReleaseConfig> {
        let file: ConfigFile = toml::from_str(toml_text).unwrap();
        ReleaseConfigBuilder::new("/work/MyProject")
            .config_file(file)
            .bundle_info(info)
            .build()
    }

    #[test]
    fn derives_defaults_from_bundle_info() {
        let config = build(
            "remote_dir = \"/srv/www\"",
            Some(BundleInfo {
                executable: Some("MyApp".into()),
                version: Some("1.2.0".into()),
                feed_url: Some("https://downloads.example.com/myapp/feed.xml".into()),
            }),
        )
        .unwrap();

        assert_eq!(config.name(), "MyApp");
        assert_eq!(config.version(), Some("1.2.0"));
        assert_eq!(config.build_type(), "Release");
        assert_eq!(
            config.appcast().base_url(),
            Some("https://downloads.example.com/myapp")
        );
        assert_eq!(config.appcast().host(), Some("downloads.example.com"));
        assert_eq!(config.appcast().appcast_filename, "feed.xml");
        assert_eq!(
            config.build_products(),
            Path::new("/work/MyProject/build/Release")
        );
        assert_eq!(
            config.staging_dir(),
            Path::new("/work/MyProject/build/Release/dmg")
        );
        assert_eq!(
            config.package_path(),
            PathBuf::from("/work/MyProject/appcast/build/MyApp-1.2.0.dmg")
        );

        let target = config.transport().unwrap();
        assert_eq!(target.protocol, TransportProtocol::Rsync);
        assert_eq!(target.extra_args, vec!["-aCvz", "--progress"]);
        assert_eq!(target.host, "downloads.example.com");
    }

    #[test]
    fn placeholder_executable_name_falls_back_to_project_dir() {
        let config = build(
            "",
            Some(BundleInfo {
                executable: Some("${EXECUTABLE_NAME}".into()),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(config.name(), "MyProject");
        assert_eq!(config.appcast().appcast_filename, "my_feed.xml");
        assert!(config.transport().is_err());
    }

    #[test]
    fn build_type_override_wins() {
        let file: ConfigFile = toml::from_str("name = \"MyApp\"\nbuild_type = \"Release\"").unwrap();
        let config = ReleaseConfigBuilder::new("/work/MyProject")
            .config_file(file)
            .build_type(Some("Debug".into()))
            .build()
            .unwrap();
        assert_eq!(config.build_products(), Path::new("/work/MyProject/build/Debug"));
    }

    #[test]
    fn application_layout_adds_bundle_and_applications_link() {
        let config = build("name = \"MyApp\"", None).unwrap();
        let layout = config.layout();
        assert_eq!(layout.entries().len(), 1);
        assert!(matches!(
            layout.entries()[0].source,
            FileSource::NamedTarget(NamedTarget::TargetBundle)
        ));
        assert_eq!(layout.entries()[0].position, Position::new(175, 65));
        assert_eq!(layout.applications_link(), Some(Position::new(347, 270)));
        assert_eq!(layout.icon_size(), 104);
        assert_eq!(layout.icon_text_size(), 12);
    }

    #[test]
    fn custom_layout_uses_only_configured_files() {
        let config = build(
            r#"
            name = "MyBundle"
            [dmg]
            project_type = "custom"
            [[dmg.files]]
            target = "root"
            name = "MyBundle.tmbundle"
            position = [100, 100]
            exclude = [".git", "build"]
            "#,
            None,
        )
        .unwrap();
        let layout = config.layout();
        assert_eq!(layout.entries().len(), 1);
        assert_eq!(layout.applications_link(), None);
        assert_eq!(layout.entries()[0].exclude.len(), 2);
    }

    #[test]
    fn entry_without_position_is_a_config_error() {
        let err = build(
            r#"
            name = "MyApp"
            [[dmg.files]]
            path = "README.txt"
            "#,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("position")));
    }

    #[test]
    fn entry_with_two_sources_is_rejected() {
        let err = build(
            r#"
            name = "MyApp"
            [[dmg.files]]
            path = "README.txt"
            link = "https://example.com"
            position = [1, 2]
            "#,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn explicit_host_and_relative_enclosures() {
        let config = build(
            r#"
            name = "MyApp"
            base_url = "https://cdn.example.com/apps/"
            host = "cdn.example.com"
            remote_dir = "apps"
            enclosure_url = "host_relative"
            transport = "scp"
            "#,
            None,
        )
        .unwrap();
        assert_eq!(
            config.appcast().enclosure_url_style,
            EnclosureUrlStyle::HostRelative
        );
        let target = config.transport().unwrap();
        assert_eq!(target.protocol, TransportProtocol::Scp);
        assert!(target.extra_args.is_empty());
    }
}
