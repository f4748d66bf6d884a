//! Staging of layout entries into a fresh working directory.
//!
//! Every [`FileEntry`] is resolved to a concrete source and a display name
//! first. Name clashes and missing sources are reported as configuration
//! errors before anything is copied.

use super::cleanup::Intermediates;
use crate::bundler::{
    error::{Error, ErrorExt, Result},
    settings::{
        DmgLayout, FileEntry, FileSource, NamedTarget, Position, ReleaseConfig, ResolveContext,
    },
    utils::fs::{self, CopyFilter},
};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

/// Name of the drag-to-install shortcut.
pub const APPLICATIONS_LINK: &str = "Applications";

/// One item in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    /// File name inside the volume
    pub name: String,
    /// Icon position in the window
    pub position: Position,
    /// Location inside the staging directory
    pub path: PathBuf,
}

/// A populated staging directory.
///
/// Dropping it deletes the directory unless it was handed on to an image.
#[derive(Debug)]
pub struct StagingDir {
    intermediates: Intermediates,
    entries: Vec<StagedEntry>,
}

impl StagingDir {
    pub fn path(&self) -> &Path {
        self.intermediates.staging_dir()
    }

    /// Staged entries in layout order, the `Applications` link last.
    pub fn entries(&self) -> &[StagedEntry] {
        &self.entries
    }

    /// Deletes the directory.
    pub async fn discard(mut self) {
        self.intermediates.remove().await;
    }

    pub(crate) fn into_parts(self) -> (Intermediates, Vec<StagedEntry>) {
        (self.intermediates, self.entries)
    }
}

/// Concrete source of an entry.
#[derive(Debug)]
enum Resolved {
    Copy(PathBuf),
    Link(String),
}

#[derive(Debug)]
struct Plan<'a> {
    entry: &'a FileEntry,
    name: String,
    source: Resolved,
}

/// Stages `layout` into the configured staging directory.
///
/// Relative sources resolve against `source_dir`. The staging directory is
/// erased first and removed again if staging fails.
pub async fn stage(
    config: &ReleaseConfig,
    layout: &DmgLayout,
    source_dir: &Path,
) -> Result<StagingDir> {
    let plans = plan_entries(config, layout, source_dir)?;
    let mut intermediates = Intermediates::new(config.staging_dir().to_path_buf());

    match populate(config, layout, &plans, intermediates.staging_dir()).await {
        Ok(entries) => Ok(StagingDir {
            intermediates,
            entries,
        }),
        Err(e) => {
            intermediates.remove().await;
            Err(e)
        }
    }
}

fn plan_entries<'a>(
    config: &ReleaseConfig,
    layout: &'a DmgLayout,
    source_dir: &Path,
) -> Result<Vec<Plan<'a>>> {
    let ctx = ResolveContext {
        project_dir: source_dir,
        build_products: config.build_products(),
        app_name: config.name(),
    };

    let mut seen = HashSet::new();
    if layout.applications_link().is_some() {
        seen.insert(APPLICATIONS_LINK.to_string());
    }

    let mut plans = Vec::with_capacity(layout.entries().len());
    for entry in layout.entries() {
        let source = resolve_source(entry, &ctx)?;
        let name = match (&entry.display_name, &source) {
            (Some(name), _) => name.clone(),
            (None, Resolved::Copy(path)) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    Error::config(format!("{} has no file name", entry.describe()))
                })?,
            (None, Resolved::Link(url)) => {
                return Err(Error::config(format!("link {} needs a name", url)));
            }
        };

        if name.is_empty() || name.contains('/') {
            return Err(Error::config(format!(
                "invalid name `{}` for {}",
                name,
                entry.describe()
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(Error::config(format!(
                "two DMG entries resolve to the same name `{}`",
                name
            )));
        }

        plans.push(Plan {
            entry,
            name,
            source,
        });
    }

    Ok(plans)
}

fn resolve_source(entry: &FileEntry, ctx: &ResolveContext<'_>) -> Result<Resolved> {
    let path = match &entry.source {
        FileSource::StaticPath(path) => absolute(ctx.project_dir, path),
        FileSource::DynamicResolver(resolver) => {
            let path = resolver.resolve(ctx).map_err(|e| {
                Error::config(format!("could not resolve {}: {}", resolver.label(), e))
            })?;
            absolute(ctx.project_dir, &path)
        }
        FileSource::NamedTarget(NamedTarget::TargetBundle) => target_bundle(ctx)?,
        FileSource::NamedTarget(NamedTarget::ProjectRoot) => ctx.project_dir.to_path_buf(),
        FileSource::NamedTarget(NamedTarget::Link { url }) => {
            return Ok(Resolved::Link(url.clone()));
        }
    };

    if std::fs::symlink_metadata(&path).is_err() {
        return Err(Error::config(format!(
            "{} does not exist ({})",
            entry.describe(),
            path.display()
        )));
    }
    Ok(Resolved::Copy(path))
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// First `{build_products}/{name}.*` in sorted order.
fn target_bundle(ctx: &ResolveContext<'_>) -> Result<PathBuf> {
    let pattern = ctx
        .build_products
        .join(format!("{}.*", glob::Pattern::escape(ctx.app_name)));
    let pattern = pattern.to_str().ok_or_else(|| {
        Error::config(format!(
            "build products path is not valid UTF-8: {}",
            ctx.build_products.display()
        ))
    })?;

    let mut matches: Vec<PathBuf> = glob::glob(pattern)?.filter_map(|m| m.ok()).collect();
    matches.sort();
    matches.into_iter().next().ok_or_else(|| {
        Error::config(format!(
            "no built bundle matching {} (build the application first)",
            pattern
        ))
    })
}

async fn populate(
    config: &ReleaseConfig,
    layout: &DmgLayout,
    plans: &[Plan<'_>],
    staging: &Path,
) -> Result<Vec<StagedEntry>> {
    log::info!("Staging DMG contents in {}", staging.display());
    fs::create_dir_all(staging, true).await?;

    let mut entries = Vec::with_capacity(plans.len() + 1);
    for plan in plans {
        let dest = staging.join(&plan.name);
        match &plan.source {
            Resolved::Link(url) => {
                log::debug!("Writing shortcut {} -> {}", plan.name, url);
                write_webloc(&dest, url)?;
            }
            Resolved::Copy(source) if source.is_dir() => {
                log::debug!("Copying {} -> {}", source.display(), dest.display());
                let filter = CopyFilter {
                    patterns: plan.entry.exclude.clone(),
                    skip: vec![
                        staging.to_path_buf(),
                        config.output_dir().to_path_buf(),
                    ],
                };
                fs::copy_dir(source, &dest, &filter).await?;
            }
            Resolved::Copy(source) => {
                log::debug!("Copying {} -> {}", source.display(), dest.display());
                fs::copy_file(source, &dest).await?;
            }
        }
        entries.push(StagedEntry {
            name: plan.name.clone(),
            position: plan.entry.position,
            path: dest,
        });
    }

    if let Some(position) = layout.applications_link() {
        let dest = staging.join(APPLICATIONS_LINK);
        fs::symlink(Path::new("/Applications"), &dest)
            .fs_context("creating Applications symlink", &dest)?;
        entries.push(StagedEntry {
            name: APPLICATIONS_LINK.to_string(),
            position,
            path: dest,
        });
    }

    log::info!("✓ Staged {} item(s)", entries.len());
    Ok(entries)
}

/// Writes a Finder `.webloc` shortcut pointing at `url`.
fn write_webloc(dest: &Path, url: &str) -> Result<()> {
    let mut dict = plist::Dictionary::new();
    dict.insert("URL".to_string(), plist::Value::String(url.to_string()));
    plist::Value::Dictionary(dict).to_file_xml(dest)?;
    Ok(())
}
