//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Sorted, depth-first directory walking using walkdir
//! - Pruning of ignored directories before they are opened
//! - Streaming content fingerprints (MD5, SHA-256, BLAKE3)
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Streaming file fingerprints
//!
//! # Example
//!
//! ```no_run
//! use photosync::scanner::{IgnoreList, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     ignore: IgnoreList::new(["@eaDir", "tmp"]),
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("/sorted"), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::path::PathBuf;
use std::time::SystemTime;

// Re-export main types
pub use hasher::{Digester, Fingerprint, HashAlgorithm, Hasher, DEFAULT_CHUNK_SIZE};
pub use walker::Walker;

/// Metadata for a discovered regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
        }
    }
}

/// Case-insensitive substring matcher for directory names.
///
/// A directory is ignored when any configured needle occurs anywhere in its
/// name, so `cache` prunes `Cache`, `.cache` and `thumbcache_old` alike.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    needles: Vec<String>,
}

impl IgnoreList {
    /// Build an ignore list, dropping blank entries.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let needles = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        Self { needles }
    }

    /// Whether `name` contains any of the configured needles.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        if self.needles.is_empty() {
            return false;
        }
        let name = name.to_lowercase();
        self.needles.iter().any(|needle| name.contains(needle.as_str()))
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.needles.is_empty()
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Directory names to prune before descending.
    pub ignore: IgnoreList,

    /// Lowercase file extensions to keep (without the dot).
    /// `None` keeps every regular file.
    pub extensions: Option<Vec<String>>,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Exact paths never yielded (the cache and log files).
    pub excluded_files: Vec<PathBuf>,
}

impl WalkerConfig {
    /// Set the extension allowlist. Entries are normalized to lowercase
    /// without a leading dot; an empty list means "all files".
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self.extensions = if list.is_empty() { None } else { Some(list) };
        self
    }

    /// Exclude a specific file from every walk.
    #[must_use]
    pub fn with_excluded_file(mut self, path: PathBuf) -> Self {
        self.excluded_files.push(path);
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A file could not be fingerprinted.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } => path,
            Self::Hash(e) => e.path(),
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path is not a regular file.
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    /// The file changed while it was being read.
    #[error("File modified during hashing: {0}")]
    Modified(PathBuf),

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::NotAFile(p)
            | Self::Modified(p)
            | Self::Interrupted(p) => p,
            Self::Io { path, .. } => path,
        }
    }

    /// Classify an I/O error for `path`.
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
