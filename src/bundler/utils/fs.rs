//! File system utilities for staging and publishing.
//!
//! Provides idempotent directory handling, filtered tree copies that
//! preserve symlinks, and atomic file replacement.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};
use tokio::fs;

/// Creates all of the directories of the specified path, erasing it first if specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> Result<()> {
    if erase {
        remove_dir_all(path).await?;
    }

    // create_dir_all is already idempotent - succeeds even if dir exists
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()), // Idempotent
        Err(e) => Err(e).fs_context("removing directory", path),
    }
}

/// Removes a file if it exists.
pub async fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).fs_context("removing file", path),
    }
}

/// Makes a symbolic link.
#[cfg(unix)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link.
#[cfg(windows)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Err(Error::GenericError(format!("{from:?} does not exist")));
    }
    if !from.is_file() {
        return Err(Error::GenericError(format!("{from:?} is not a file")));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating parent directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file", from)?;
    Ok(())
}

/// Entries skipped by [`copy_dir`].
#[derive(Debug, Clone, Default)]
pub struct CopyFilter {
    /// Glob patterns matched against the path relative to the copy root
    /// and against the bare file name.
    pub patterns: Vec<glob::Pattern>,
    /// Absolute paths pruned with everything below them.
    pub skip: Vec<PathBuf>,
}

impl CopyFilter {
    fn excludes(&self, root: &Path, path: &Path) -> bool {
        if self.skip.iter().any(|skip| path.starts_with(skip)) {
            return true;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            return false;
        };
        if rel.as_os_str().is_empty() {
            return false;
        }
        let file_name = path.file_name().map(Path::new);
        self.patterns.iter().any(|pattern| {
            pattern.matches_path(rel) || file_name.is_some_and(|name| pattern.matches_path(name))
        })
    }
}

/// Recursively copies a directory from one path to another, creating any
/// parent directories of the destination path as necessary.
///
/// Preserves symlinks and prunes whatever `filter` excludes. Fails if the
/// source path is not a directory or doesn't exist.
pub async fn copy_dir(from: &Path, to: &Path, filter: &CopyFilter) -> Result<()> {
    if !from.exists() {
        return Err(Error::GenericError(format!("{from:?} does not exist")));
    }
    if !from.is_dir() {
        return Err(Error::GenericError(format!("{from:?} is not a Directory")));
    }

    let from = from.to_path_buf();
    let to = to.to_path_buf();
    let filter = filter.clone();

    tokio::task::spawn_blocking(move || -> Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).fs_context("creating parent directory", parent)?;
        }

        let walker = walkdir::WalkDir::new(&from)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !filter.excludes(&from, entry.path()));

        for entry in walker {
            let entry = entry?;
            let rel_path = entry.path().strip_prefix(&from)?;
            let dest_path = to.join(rel_path);

            if entry.file_type().is_symlink() {
                let target = std::fs::read_link(entry.path())
                    .fs_context("reading symlink", entry.path())?;
                symlink(&target, &dest_path).fs_context("recreating symlink", &dest_path)?;
            } else if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest_path)
                    .fs_context("creating directory", &dest_path)?;
            } else {
                std::fs::copy(entry.path(), &dest_path).fs_context("copying file", entry.path())?;
            }
        }

        Ok(())
    })
    .await
    .map_err(|e| Error::GenericError(format!("Directory copy task panicked: {}", e)))?
}

/// Total size in bytes of the regular files below `path`.
pub async fn dir_size(path: &Path) -> Result<u64> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut total = 0u64;
        for entry in walkdir::WalkDir::new(&path).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_file() {
                total += entry.metadata().map_err(Error::from)?.len();
            }
        }
        Ok(total)
    })
    .await
    .map_err(|e| Error::GenericError(format!("Size calculation task panicked: {}", e)))?
}

/// Replaces `path` with `contents` atomically.
///
/// Writes a temporary file in the destination directory, syncs it and renames
/// it over the destination, so readers see either the old or the new file.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).fs_context("creating parent directory", &dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&dir)
            .fs_context("creating temporary file", &dir)?;
        tmp.write_all(&contents)
            .fs_context("writing temporary file", tmp.path())?;
        tmp.as_file()
            .sync_all()
            .fs_context("syncing temporary file", tmp.path())?;
        tmp.persist(&path).map_err(|e| Error::Fs {
            context: "replacing file",
            path: path.clone(),
            error: e.error,
        })?;
        Ok(())
    })
    .await
    .map_err(|e| Error::GenericError(format!("Atomic write task panicked: {}", e)))?
}
