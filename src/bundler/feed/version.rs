//! Version ordering for feed items.
//!
//! Numeric ordering compares dot-separated segments as integers, so
//! `1.10.0` sorts above `1.9.0`; missing segments count as zero. An optional
//! `-prerelease` suffix ranks below the plain release and is ordered by
//! semver rules. Build metadata after `+` is ignored.

use crate::bundler::{
    error::{Error, Result},
    settings::VersionOrdering,
};
use std::cmp::Ordering;

/// Sort key of a feed item version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionKey {
    Numeric {
        segments: Vec<u64>,
        pre: Option<semver::Prerelease>,
    },
    Lexical(String),
}

impl VersionKey {
    /// Parses `version` under `ordering`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when `ordering` is numeric and `version` is not made
    /// of numeric segments.
    pub fn parse(version: &str, ordering: VersionOrdering) -> Result<Self> {
        match ordering {
            VersionOrdering::Lexical => Ok(Self::Lexical(version.to_string())),
            VersionOrdering::Numeric => parse_numeric(version).ok_or_else(|| {
                Error::config(format!(
                    "version `{}` is not numeric (e.g. 1.2.0 or 1.2.0-beta.1); \
                     set `version_ordering = \"lexical\"` to order free-form versions",
                    version
                ))
            }),
        }
    }
}

fn parse_numeric(version: &str) -> Option<VersionKey> {
    let version = version.trim();
    let version = version.split_once('+').map_or(version, |(v, _)| v);
    let (core, pre) = match version.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (version, None),
    };

    let segments = core
        .split('.')
        .map(|segment| {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                segment.parse::<u64>().ok()
            }
        })
        .collect::<Option<Vec<_>>>()?;

    let pre = match pre {
        Some(pre) => Some(semver::Prerelease::new(pre).ok().filter(|p| !p.is_empty())?),
        None => None,
    };

    Some(VersionKey::Numeric { segments, pre })
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Self::Numeric {
                    segments: a,
                    pre: pre_a,
                },
                Self::Numeric {
                    segments: b,
                    pre: pre_b,
                },
            ) => {
                let len = a.len().max(b.len());
                for i in 0..len {
                    let x = a.get(i).copied().unwrap_or(0);
                    let y = b.get(i).copied().unwrap_or(0);
                    match x.cmp(&y) {
                        Ordering::Equal => continue,
                        unequal => return unequal,
                    }
                }
                match (pre_a, pre_b) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Greater,
                    (Some(_), None) => Ordering::Less,
                    (Some(x), Some(y)) => x.cmp(y),
                }
            }
            (Self::Lexical(a), Self::Lexical(b)) => a.cmp(b),
            (Self::Numeric { .. }, Self::Lexical(_)) => Ordering::Greater,
            (Self::Lexical(_), Self::Numeric { .. }) => Ordering::Less,
        }
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
