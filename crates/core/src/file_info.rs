//! Filesystem entry identity and metadata

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};

/// A filesystem entry as seen at a point in time.
///
/// Identity is the absolute path (case-sensitive): two records name the
/// same entry iff their paths are equal. The derived `PartialEq` compares
/// all attributes and is what "unchanged" means in a diff.
///
/// Directories record epoch time and size zero so that churn among a
/// directory's children never makes the directory itself look modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    path: PathBuf,
    is_directory: bool,
    last_write_time: SystemTime,
    size: u64,
}

impl FileInfo {
    /// Build a record from already-known attributes.
    pub fn new(
        path: impl Into<PathBuf>,
        is_directory: bool,
        last_write_time: SystemTime,
        size: u64,
    ) -> Self {
        if is_directory {
            Self::directory(path)
        } else {
            Self {
                path: path.into(),
                is_directory: false,
                last_write_time,
                size,
            }
        }
    }

    /// Build a directory record (attributes pinned to epoch/zero).
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            last_write_time: SystemTime::UNIX_EPOCH,
            size: 0,
        }
    }

    /// Stat `path` and build a record from the result.
    pub fn for_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::from_metadata(path, &metadata))
    }

    /// Build a record from a path and its metadata.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        if metadata.is_dir() {
            Self::directory(path)
        } else {
            Self {
                path: path.to_path_buf(),
                is_directory: false,
                last_write_time: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size: metadata.len(),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn last_write_time(&self) -> SystemTime {
        self.last_write_time
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The entry's final path component, if any.
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }

    /// Whether both records name the same entry (path identity).
    pub fn same_entry(&self, other: &FileInfo) -> bool {
        self.path == other.path
    }

    /// The total order all snapshots and diffs use: component-wise path
    /// comparison, so a directory always precedes its own descendants
    /// and pre-order traversal of a sorted tree yields a sorted sequence.
    pub fn path_cmp(&self, other: &FileInfo) -> Ordering {
        self.path.cmp(&other.path)
    }
}

/// Comparator form of [`FileInfo::path_cmp`] for `sort_by` call sites.
pub fn path_less_than(a: &FileInfo, b: &FileInfo) -> bool {
    a.path_cmp(b) == Ordering::Less
}
