//! Advisory run lock.
//!
//! One release run at a time may touch a given volume name and feed file.
//! The lock is an exclusive `flock` on a file in the output directory and is
//! released when [`RunLock`] is dropped.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

/// Held for the duration of a run.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl RunLock {
    /// Takes the lock at `path` without waiting.
    ///
    /// Fails with [`Error::ResourceBusy`] when another run holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).fs_context("creating lock directory", parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .fs_context("opening run lock", path)?;

        #[cfg(unix)]
        {
            use nix::{
                errno::Errno,
                fcntl::{Flock, FlockArg},
            };

            let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
                if errno == Errno::EWOULDBLOCK {
                    Error::ResourceBusy {
                        resource: path.display().to_string(),
                        attempts: 1,
                        reason: "another release run holds this lock".to_string(),
                    }
                } else {
                    Error::GenericError(format!(
                        "failed to lock {}: {}",
                        path.display(),
                        errno
                    ))
                }
            })?;

            log::debug!("Acquired run lock {}", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                _lock: lock,
            });
        }

        #[cfg(not(unix))]
        {
            return Ok(Self {
                path: path.to_path_buf(),
                _file: file,
            });
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        log::debug!("Released run lock {}", self.path.display());
    }
}
