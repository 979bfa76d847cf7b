//! JSON-backed fingerprint cache.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::entry::CacheKey;
use crate::scanner::{Fingerprint, HashAlgorithm};

/// Version of the on-disk cache document.
pub const CACHE_VERSION: u32 = 1;

/// Errors raised while persisting the cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// Reading or writing the cache file failed.
    #[error("cache I/O error for {path}: {source}")]
    Io {
        /// Cache file or directory involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The cache document could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The document was written by another digest algorithm or format version.
    #[error("cache built with {found} (version {version}), expected {expected} (version {CACHE_VERSION})")]
    Incompatible {
        /// Algorithm recorded in the file
        found: String,
        /// Version recorded in the file
        version: u32,
        /// Algorithm currently configured
        expected: HashAlgorithm,
    },
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    algorithm: HashAlgorithm,
    entries: &'a HashMap<String, String>,
}

#[derive(Deserialize)]
struct Document {
    version: u32,
    algorithm: String,
    entries: HashMap<String, String>,
}

/// Mapping from `path:mtime` to fingerprint, carried between runs.
///
/// Lifecycle: [`load`](Self::load) once, [`lookup`](Self::lookup) and
/// [`record`](Self::record) while indexing, [`persist`](Self::persist) at
/// the end (and at checkpoints).
#[derive(Debug)]
pub struct FingerprintCache {
    path: Option<PathBuf>,
    algorithm: HashAlgorithm,
    entries: HashMap<String, String>,
    dirty: bool,
    pending: usize,
}

impl FingerprintCache {
    /// A cache that lives only for this process.
    #[must_use]
    pub fn in_memory(algorithm: HashAlgorithm) -> Self {
        Self {
            path: None,
            algorithm,
            entries: HashMap::new(),
            dirty: false,
            pending: 0,
        }
    }

    /// Load the cache stored at `path`.
    ///
    /// Never fails: a missing file yields an empty cache, and an unreadable,
    /// corrupt or incompatible file is reported as a warning and also yields
    /// an empty cache.
    #[must_use]
    pub fn load(path: &Path, algorithm: HashAlgorithm) -> Self {
        let mut cache = Self::in_memory(algorithm);
        cache.path = Some(path.to_path_buf());

        match Self::read_entries(path, algorithm) {
            Ok(Some(entries)) => {
                log::debug!(
                    "Loaded {} cached fingerprints from {}",
                    entries.len(),
                    path.display()
                );
                cache.entries = entries;
            }
            Ok(None) => {
                log::debug!("No fingerprint cache at {}, starting fresh", path.display());
            }
            Err(e) => {
                log::warn!(
                    "Corrupted hash cache at {}, rebuilding... ({})",
                    path.display(),
                    e
                );
            }
        }

        cache
    }

    fn read_entries(
        path: &Path,
        algorithm: HashAlgorithm,
    ) -> CacheResult<Option<HashMap<String, String>>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let document: Document = serde_json::from_str(&content)?;
        if document.version != CACHE_VERSION || document.algorithm != algorithm.name() {
            return Err(CacheError::Incompatible {
                found: document.algorithm,
                version: document.version,
                expected: algorithm,
            });
        }

        Ok(Some(document.entries))
    }

    /// Fingerprint recorded for `path` at exactly `mtime`, if any.
    ///
    /// Any drift in the modification time is a miss. Stored values that do
    /// not look like a digest of the configured algorithm are misses too.
    #[must_use]
    pub fn lookup(&self, path: &Path, mtime: SystemTime) -> Option<Fingerprint> {
        let key = CacheKey::new(path, mtime);
        self.entries
            .get(key.as_str())
            .filter(|hex| self.algorithm.is_valid_hex(hex))
            .map(|hex| Fingerprint::from_hex(hex.as_str()))
    }

    /// Insert or overwrite the fingerprint for `path` at `mtime`.
    pub fn record(&mut self, path: &Path, mtime: SystemTime, fingerprint: &Fingerprint) {
        let key = CacheKey::new(path, mtime).into_string();
        let previous = self
            .entries
            .insert(key, fingerprint.as_str().to_string());
        if previous.as_deref() != Some(fingerprint.as_str()) {
            self.dirty = true;
            self.pending += 1;
        }
    }

    /// Write the full cache back to disk.
    ///
    /// Returns `Ok(false)` when nothing needed writing (in-memory cache or no
    /// changes since the last persist).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the temporary file cannot be written or
    /// renamed into place. The previous cache file is left untouched.
    pub fn persist(&mut self) -> CacheResult<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        if !self.dirty {
            return Ok(false);
        }

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = |source: std::io::Error, at: &Path| CacheError::Io {
            path: at.to_path_buf(),
            source,
        };

        fs::create_dir_all(parent).map_err(|e| io_err(e, parent))?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_err(e, parent))?;

        {
            let mut writer = BufWriter::new(&mut tmp);
            serde_json::to_writer(
                &mut writer,
                &DocumentRef {
                    version: CACHE_VERSION,
                    algorithm: self.algorithm,
                    entries: &self.entries,
                },
            )?;
            writer.flush().map_err(|e| io_err(e, &path))?;
        }
        tmp.as_file().sync_all().map_err(|e| io_err(e, &path))?;
        tmp.persist(&path).map_err(|e| io_err(e.error, &path))?;

        log::debug!(
            "Persisted {} fingerprints to {}",
            self.entries.len(),
            path.display()
        );
        self.dirty = false;
        self.pending = 0;
        Ok(true)
    }

    /// Drop every entry. The next [`persist`](Self::persist) writes an empty cache.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = true;
        self.pending = 0;
    }

    /// Number of cached fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no fingerprints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fingerprints recorded since the last successful persist.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.pending
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Algorithm the cached fingerprints belong to.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}
