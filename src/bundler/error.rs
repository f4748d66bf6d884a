//! Error taxonomy for packaging, feed and publish operations.
//!
//! Every stage reports failures through [`Error`]. The four domain variants
//! (`Config`, `ResourceBusy`, `Parse`, `Transport`) carry the classification
//! callers act on; the rest wrap lower level failures with enough context to
//! name the resource involved.

use std::path::{Path, PathBuf};

/// Result alias used throughout the bundler.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling, describing or publishing a release.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required value is missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A mount, unmount or lock could not be obtained after bounded retries.
    #[error("{resource} is busy after {attempts} attempt(s): {reason}")]
    ResourceBusy {
        /// Volume, mount point or lock file that stayed busy
        resource: String,
        /// Number of attempts made
        attempts: u32,
        /// Last reason reported by the tool
        reason: String,
    },

    /// An existing document is not of the expected shape.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse {
        /// Document that failed to parse
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// One or more artifacts failed to upload.
    #[error("{} artifact(s) failed to upload: {}", failures.len(), failures.join("; "))]
    Transport {
        /// One line per failed artifact
        failures: Vec<String>,
    },

    /// An external tool exited unsuccessfully.
    #[error("`{tool}` failed: {reason}")]
    Tool {
        /// Program name
        tool: String,
        /// Captured stderr or spawn error
        reason: String,
    },

    /// A pipeline stage failed.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Stage name (`assemble`, `update-feed`, `publish`)
        stage: &'static str,
        /// Underlying failure
        source: Box<Error>,
    },

    /// Filesystem failure with the operation and path it happened on.
    #[error("{context} ({}): {error}", path.display())]
    Fs {
        /// Operation being performed
        context: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying io error
        #[source]
        error: std::io::Error,
    },

    /// Uncategorised failure.
    #[error("{0}")]
    GenericError(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    #[error(transparent)]
    StripPrefix(#[from] std::path::StripPrefixError),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("property list error: {0}")]
    Plist(#[from] plist::Error),

    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Builds a [`Error::Config`].
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Builds a [`Error::Parse`] for `path`.
    pub fn parse(path: &Path, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Wraps this error with the pipeline stage it happened in.
    pub fn in_stage(self, stage: &'static str) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Strips `Stage` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage this error was raised in, if it passed through the pipeline.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Io error helpers.
pub trait ErrorExt<T> {
    /// Convert an io error into [`Error::Fs`] naming the operation and path.
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.as_ref().to_path_buf(),
            error,
        })
    }
}

/// Return early with an [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError(format!($msg)))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unwraps_stage() {
        let err = Error::config("no base url").in_stage("update-feed");

        assert!(matches!(err.root(), Error::Config(_)));
        assert_eq!(err.stage(), Some("update-feed"));
        assert!(err.to_string().contains("update-feed stage failed"));
    }

    #[test]
    fn fs_context_names_path() {
        let io: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = io.fs_context("reading feed", "/tmp/feed.xml").unwrap_err();
        assert_eq!(err.to_string(), "reading feed (/tmp/feed.xml): gone");
    }

    #[test]
    fn transport_error_lists_failures() {
        let err = Error::Transport {
            failures: vec!["MyApp.dmg: exit 23".into()],
        };
        assert_eq!(
            err.to_string(),
            "1 artifact(s) failed to upload: MyApp.dmg: exit 23"
        );
    }
}
