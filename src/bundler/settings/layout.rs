//! DMG window layout: what goes into the image and where each icon sits.

use crate::bundler::error::{Error, Result};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Smallest icon size Finder accepts.
pub const MIN_ICON_SIZE: u32 = 16;
/// Largest icon size Finder accepts.
pub const MAX_ICON_SIZE: u32 = 128;

/// Icon position inside the DMG window, in points from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(from = "[i32; 2]")]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<[i32; 2]> for Position {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Values a [`DynamicResolver`] may consult.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Project directory relative paths are resolved against
    pub project_dir: &'a Path,
    /// Directory holding the already built products (`build/{build_type}`)
    pub build_products: &'a Path,
    /// Application name
    pub app_name: &'a str,
}

type ResolveFn = dyn Fn(&ResolveContext<'_>) -> Result<PathBuf> + Send + Sync;

/// A source path computed at staging time.
#[derive(Clone)]
pub struct DynamicResolver {
    label: String,
    resolve: Arc<ResolveFn>,
}

impl DynamicResolver {
    /// Wraps an arbitrary resolution function. `label` is used in logs and errors.
    pub fn new<F>(label: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&ResolveContext<'_>) -> Result<PathBuf> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            resolve: Arc::new(resolve),
        }
    }

    /// Resolves to the first path (in sorted order) matching `pattern`,
    /// relative to the project directory.
    pub fn glob(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let label = format!("glob `{}`", pattern);
        Self::new(label, move |ctx| {
            let full = ctx.project_dir.join(&pattern);
            let full = full.to_str().ok_or_else(|| {
                Error::config(format!("glob `{}` is not valid UTF-8", pattern))
            })?;
            let mut matches: Vec<PathBuf> = glob::glob(full)?.filter_map(|m| m.ok()).collect();
            matches.sort();
            matches
                .into_iter()
                .next()
                .ok_or_else(|| Error::config(format!("glob `{}` matched nothing", pattern)))
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<PathBuf> {
        (self.resolve)(ctx)
    }
}

impl fmt::Debug for DynamicResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicResolver")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Well-known sources that are resolved by name rather than by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedTarget {
    /// The built application bundle, `{build_products}/{name}.*`.
    TargetBundle,
    /// The whole project directory (e.g. a plugin bundle).
    ProjectRoot,
    /// A remote link, staged as a `.webloc` shortcut file.
    Link { url: String },
}

/// Where a file entry's content comes from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Literal path, relative to the project directory unless absolute.
    StaticPath(PathBuf),
    /// Path computed when staging.
    DynamicResolver(DynamicResolver),
    /// Target resolved by name.
    NamedTarget(NamedTarget),
}

/// One item placed in the DMG window.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub source: FileSource,
    pub position: Position,
    /// Name inside the image; defaults to the source's file name.
    pub display_name: Option<String>,
    /// Files and folders left out when copying a directory source.
    pub exclude: Vec<glob::Pattern>,
}

impl FileEntry {
    pub fn new(source: FileSource, position: Position) -> Self {
        Self {
            source,
            position,
            display_name: None,
            exclude: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Adds exclude patterns, skipping duplicates.
    pub fn with_excludes<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = glob::Pattern::new(pattern.as_ref())?;
            if !self.exclude.contains(&pattern) {
                self.exclude.push(pattern);
            }
        }
        Ok(self)
    }

    /// Short description used in log lines and errors.
    pub fn describe(&self) -> String {
        match &self.source {
            FileSource::StaticPath(path) => path.display().to_string(),
            FileSource::DynamicResolver(resolver) => resolver.label().to_string(),
            FileSource::NamedTarget(NamedTarget::TargetBundle) => "target bundle".to_string(),
            FileSource::NamedTarget(NamedTarget::ProjectRoot) => "project root".to_string(),
            FileSource::NamedTarget(NamedTarget::Link { url }) => format!("link {}", url),
        }
    }
}

/// Normalises a link name to a `.webloc` file name.
///
/// `Github`, `Github.webloc` and `Github.url` all become `Github.webloc`.
pub fn link_file_name(name: &str) -> String {
    let stem = name
        .strip_suffix(".webloc")
        .or_else(|| name.strip_suffix(".url"))
        .unwrap_or(name);
    format!("{}.webloc", stem)
}

/// Validated DMG window layout.
#[derive(Debug, Clone)]
pub struct DmgLayout {
    background: Option<PathBuf>,
    volume_icon: Option<PathBuf>,
    applications_icon: Option<PathBuf>,
    icon_size: u32,
    icon_text_size: u32,
    window_size: (u32, u32),
    applications_link: Option<Position>,
    entries: Vec<FileEntry>,
}

impl DmgLayout {
    /// Builds a layout from `entries`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when there are no entries, a link has no name, or
    /// the icon size is outside 16–128.
    pub fn new(entries: Vec<FileEntry>, icon_size: u32, icon_text_size: u32) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::config("DMG layout has no files"));
        }
        if !(MIN_ICON_SIZE..=MAX_ICON_SIZE).contains(&icon_size) {
            return Err(Error::config(format!(
                "icon size {} is outside {}..={}",
                icon_size, MIN_ICON_SIZE, MAX_ICON_SIZE
            )));
        }
        if icon_text_size == 0 {
            return Err(Error::config("icon text size must be positive"));
        }

        let mut normalized = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if let FileSource::NamedTarget(NamedTarget::Link { url }) = &entry.source {
                let name = entry.display_name.as_deref().ok_or_else(|| {
                    Error::config(format!("link {} needs a name", url))
                })?;
                entry.display_name = Some(link_file_name(name));
            }
            normalized.push(entry);
        }

        Ok(Self {
            background: None,
            volume_icon: None,
            applications_icon: None,
            icon_size,
            icon_text_size,
            window_size: (600, 400),
            applications_link: None,
            entries: normalized,
        })
    }

    pub fn with_background(mut self, background: Option<PathBuf>) -> Self {
        self.background = background;
        self
    }

    pub fn with_volume_icon(mut self, icon: Option<PathBuf>) -> Self {
        self.volume_icon = icon;
        self
    }

    /// Custom icon for the `Applications` shortcut.
    pub fn with_applications_icon(mut self, icon: Option<PathBuf>) -> Self {
        self.applications_icon = icon;
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    /// Adds the drag-to-install `Applications` shortcut at `position`.
    pub fn with_applications_link(mut self, position: Option<Position>) -> Self {
        self.applications_link = position;
        self
    }

    pub fn background(&self) -> Option<&Path> {
        self.background.as_deref()
    }

    pub fn volume_icon(&self) -> Option<&Path> {
        self.volume_icon.as_deref()
    }

    pub fn applications_icon(&self) -> Option<&Path> {
        self.applications_icon.as_deref()
    }

    pub fn icon_size(&self) -> u32 {
        self.icon_size
    }

    pub fn icon_text_size(&self) -> u32 {
        self.icon_text_size
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.window_size
    }

    pub fn applications_link(&self) -> Option<Position> {
        self.applications_link
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }
}
