//! Content-identity index.
//!
//! This module provides:
//! - [`FileRecord`]: a file together with the fingerprint observed for it
//! - [`FingerprintIndex`]: fingerprint → one representative file per tree
//! - [`DirectoryIndexer`]: builds an index for a tree, consulting the
//!   [`FingerprintCache`](crate::cache::FingerprintCache) before hashing
//!
//! # Example
//!
//! ```no_run
//! use photosync::cache::FingerprintCache;
//! use photosync::index::{DirectoryIndexer, IndexerConfig};
//! use photosync::scanner::HashAlgorithm;
//! use std::path::Path;
//!
//! let mut cache = FingerprintCache::load(Path::new("hash_cache.json"), HashAlgorithm::Md5);
//! let indexer = DirectoryIndexer::with_algorithm(IndexerConfig::default(), HashAlgorithm::Md5);
//! let (index, stats) = indexer.index("destination", Path::new("/sorted"), &mut cache);
//! println!("{} unique files, {} errors", index.len(), stats.error_count());
//! ```

pub mod indexer;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::scanner::Fingerprint;

pub use indexer::{DirectoryIndexer, IndexStats, IndexerConfig};

/// A file and the fingerprint observed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path
    pub path: PathBuf,
    /// Path relative to the indexed root
    pub relative: PathBuf,
    /// Size in bytes when indexed
    pub size: u64,
    /// Modification time when indexed
    pub modified: SystemTime,
    /// Content fingerprint
    pub fingerprint: Fingerprint,
}

impl FileRecord {
    /// Create a record for `path` under `root`.
    #[must_use]
    pub fn new(
        root: &Path,
        path: PathBuf,
        size: u64,
        modified: SystemTime,
        fingerprint: Fingerprint,
    ) -> Self {
        let relative = path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        Self {
            path,
            relative,
            size,
            modified,
            fingerprint,
        }
    }

    /// File name component, falling back to the relative path.
    #[must_use]
    pub fn file_name(&self) -> &std::ffi::OsStr {
        self.path
            .file_name()
            .unwrap_or_else(|| self.relative.as_os_str())
    }
}

/// Mapping from fingerprint to the first file seen with that content.
///
/// Records keep insertion (traversal) order so that anything derived from
/// an index is deterministic. Rebuilt every run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintIndex {
    root: PathBuf,
    records: Vec<FileRecord>,
    positions: HashMap<Fingerprint, usize>,
}

impl FingerprintIndex {
    /// Empty index for the tree rooted at `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            records: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Insert `record` unless its fingerprint is already present.
    ///
    /// Returns `false` when an earlier file already represents this content;
    /// the new record is dropped (first-seen-wins).
    pub fn insert(&mut self, record: FileRecord) -> bool {
        if self.positions.contains_key(&record.fingerprint) {
            return false;
        }
        self.positions
            .insert(record.fingerprint.clone(), self.records.len());
        self.records.push(record);
        true
    }

    /// Representative record for `fingerprint`.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&FileRecord> {
        self.positions.get(fingerprint).map(|&i| &self.records[i])
    }

    /// Whether `fingerprint` is present.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.positions.contains_key(fingerprint)
    }

    /// Records in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter()
    }

    /// Number of distinct fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Root of the indexed tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
