//! Bucket keys and bucket file access.
//!
//! A bucket is one on-disk JSON file holding every quest for an
//! (expansion, patch, category) triple. Keys look like `2.x/2.1/msq` and map to
//! `<root>/2.x/2.1/21msq.json`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::{BUCKET_FILE_EXTENSION, PERMANENT_CATEGORY, SHARED_CATEGORIES};
use crate::quest::QuestRecord;

/// Composite key identifying one bucket file.
///
/// The key is stored as written in the manifest. Its shape is only checked when
/// the bucket is resolved to a file, so a malformed key rejects the load rather
/// than the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketKey(String);

/// Borrowed view of a well-formed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSegments<'a> {
    pub expansion: &'a str,
    pub patch: &'a str,
    pub category: &'a str,
}

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("bucket key `{0}` is not of the form <major>.x/<major>.<minor>/<category>")]
    MalformedKey(String),
    #[error("bucket file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to read bucket file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bucket file {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("bucket file {} contains no quests", .0.display())]
    Empty(PathBuf),
}

impl BucketKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a patch given as a two digit prefix, e.g. `21` → `2.x/2.1/<category>`.
    #[must_use]
    pub fn from_patch_prefix(prefix: u32, category: &str) -> Self {
        let major = prefix / 10;
        let minor = prefix % 10;
        Self(format!("{major}.x/{major}.{minor}/{category}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, whether or not the key is well formed.
    #[must_use]
    pub fn category(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Seasonal buckets stay resident for the whole session.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.category().eq_ignore_ascii_case(PERMANENT_CATEGORY)
    }

    /// Main scenario and feature buckets are shared whole by every leaf that
    /// references them; other buckets are split by area.
    #[must_use]
    pub fn is_shared_whole(&self) -> bool {
        let category = self.category();
        SHARED_CATEGORIES
            .iter()
            .any(|shared| category.eq_ignore_ascii_case(shared))
    }

    /// Split into expansion, patch and category.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::MalformedKey`] unless the key has exactly three
    /// non-empty segments with a `<major>.x` expansion and `<major>.<minor>` patch.
    pub fn segments(&self) -> Result<BucketSegments<'_>, BucketError> {
        let malformed = || BucketError::MalformedKey(self.0.clone());
        let mut parts = self.0.split('/');
        let (Some(expansion), Some(patch), Some(category), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        if expansion.is_empty() || patch.is_empty() || category.is_empty() {
            return Err(malformed());
        }
        let Some((major, minor)) = patch.split_once('.') else {
            return Err(malformed());
        };
        let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !numeric(major) || !numeric(minor) || expansion != format!("{major}.x") {
            return Err(malformed());
        }
        Ok(BucketSegments {
            expansion,
            patch,
            category,
        })
    }

    /// File location of this bucket under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::MalformedKey`] for keys without the expected shape.
    pub fn file_path(&self, root: &Path) -> Result<PathBuf, BucketError> {
        let segments = self.segments()?;
        let file_name = format!(
            "{}{}.{BUCKET_FILE_EXTENSION}",
            segments.patch.replace('.', ""),
            segments.category
        );
        Ok(root
            .join(segments.expansion)
            .join(segments.patch)
            .join(file_name))
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BucketKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Parse bucket file content.
///
/// # Errors
///
/// Returns [`BucketError::Malformed`] for invalid JSON or records without ids and
/// [`BucketError::Empty`] for an empty quest list.
pub fn parse_bucket(path: &Path, json: &str) -> Result<Vec<QuestRecord>, BucketError> {
    let quests: Vec<QuestRecord> =
        serde_json::from_str(json).map_err(|err| BucketError::Malformed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    if let Some(quest) = quests.iter().find(|quest| quest.ids.is_empty()) {
        return Err(BucketError::Malformed {
            path: path.to_path_buf(),
            reason: format!("quest `{}` has no ids", quest.title),
        });
    }
    if quests.is_empty() {
        return Err(BucketError::Empty(path.to_path_buf()));
    }
    Ok(quests)
}

/// Source of bucket contents.
/// The filesystem implementation is [`FsBucketReader`]; tests substitute fixtures.
pub trait BucketReader {
    /// Read every quest in the bucket identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`BucketError`] when the key is malformed or the bucket cannot
    /// be read or parsed.
    fn read_bucket(&self, key: &BucketKey) -> Result<Vec<QuestRecord>, BucketError>;
}

impl<R: BucketReader + ?Sized> BucketReader for &R {
    fn read_bucket(&self, key: &BucketKey) -> Result<Vec<QuestRecord>, BucketError> {
        (**self).read_bucket(key)
    }
}

/// Reads bucket files from a quests directory.
#[derive(Debug, Clone)]
pub struct FsBucketReader {
    root: PathBuf,
}

impl FsBucketReader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BucketReader for FsBucketReader {
    fn read_bucket(&self, key: &BucketKey) -> Result<Vec<QuestRecord>, BucketError> {
        let path = key.file_path(&self.root)?;
        let json = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                BucketError::Missing(path.clone())
            } else {
                BucketError::Unreadable {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        parse_bucket(&path, &json)
    }
}
