//! Application identity and package naming.

/// Name and version of the application being released.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_appcast::bundler::PackageSettings;
///
/// let package = PackageSettings::new("My App", Some("1.2.0".into()));
/// assert_eq!(package.safe_name(), "My_App");
/// assert_eq!(package.pkg_name(), "My_App-1.2.0.dmg");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSettings {
    /// Application name, also used as the DMG volume name.
    pub name: String,

    /// Release version, usually `CFBundleVersion`.
    ///
    /// Default: None (versionless package name)
    pub version: Option<String>,
}

impl PackageSettings {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Name with spaces replaced by underscores, safe for file names and URLs.
    pub fn safe_name(&self) -> String {
        self.name.replace(' ', "_")
    }

    /// Generated file name for the distribution, e.g. `MyApp-1.0.0.dmg`.
    pub fn pkg_name(&self) -> String {
        match &self.version {
            Some(version) => format!("{}-{}.dmg", self.safe_name(), version),
            None => self.versionless_pkg_name(),
        }
    }

    /// Version-less file name for the distribution, e.g. `MyApp.dmg`.
    pub fn versionless_pkg_name(&self) -> String {
        format!("{}.dmg", self.safe_name())
    }
}
