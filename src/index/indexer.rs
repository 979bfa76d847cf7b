//! Directory indexer.
//!
//! # Overview
//!
//! [`DirectoryIndexer::index`] walks one tree and produces its
//! [`FingerprintIndex`]:
//!
//! 1. **Walk** - sorted depth-first traversal, ignored directories pruned
//! 2. **Lookup** - each file is looked up in the cache by `(path, mtime)`
//! 3. **Hash** - cache misses of a batch are digested on a bounded rayon pool
//! 4. **Merge** - results are folded back in walk order on the calling
//!    thread, which alone mutates the cache and the index
//!
//! Because the merge happens in walk order, "first seen" means first in
//! sorted traversal order regardless of which worker finishes first.
//!
//! Failures are never fatal: a file that cannot be hashed is logged,
//! recorded in [`IndexStats::errors`], and left out of both the index and
//! the cache.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use rayon::prelude::*;

use super::{FileRecord, FingerprintIndex};
use crate::cache::FingerprintCache;
use crate::progress::{ProgressCadence, ProgressCallback, ProgressTicker, ProgressUpdate};
use crate::scanner::{
    Digester, FileEntry, Fingerprint, HashAlgorithm, HashError, Hasher, ScanError, Walker,
    WalkerConfig,
};

/// Configuration for the directory indexer.
#[derive(Clone)]
pub struct IndexerConfig {
    /// Traversal filters.
    pub walker: WalkerConfig,
    /// Number of worker threads digesting cache misses.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Files looked up and hashed together.
    pub batch_size: usize,
    /// Persist the cache after this many new fingerprints (0 disables).
    pub checkpoint_every: usize,
    /// Progress cadence.
    pub cadence: ProgressCadence,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for IndexerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerConfig")
            .field("walker", &self.walker)
            .field("io_threads", &self.io_threads)
            .field("batch_size", &self.batch_size)
            .field("checkpoint_every", &self.checkpoint_every)
            .field("cadence", &self.cadence)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            walker: WalkerConfig::default(),
            io_threads: 4,
            batch_size: 256,
            checkpoint_every: 5_000,
            cadence: ProgressCadence::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl IndexerConfig {
    /// Set the traversal filters.
    #[must_use]
    pub fn with_walker_config(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    /// Set the number of hashing threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the lookup/hash batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the checkpoint interval.
    #[must_use]
    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = every;
        self
    }

    /// Set the progress cadence.
    #[must_use]
    pub fn with_cadence(mut self, cadence: ProgressCadence) -> Self {
        self.cadence = cadence;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Statistics from indexing one tree.
#[derive(Debug, Default)]
pub struct IndexStats {
    /// Regular files visited
    pub scanned: usize,
    /// Fingerprints served from the cache
    pub cache_hits: usize,
    /// Fingerprints computed by the digester
    pub hashed: usize,
    /// Files whose content was already represented in this tree
    pub shadowed: usize,
    /// Bytes read by the digester
    pub bytes_hashed: u64,
    /// Files and directories that were skipped because of errors
    pub errors: Vec<ScanError>,
    /// Whether the cache could not be written at the end of the walk
    pub cache_persist_failed: bool,
    /// Whether indexing stopped early on a shutdown request
    pub interrupted: bool,
    /// Wall-clock time spent
    pub duration: Duration,
}

impl IndexStats {
    /// Number of errors recorded.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    fn snapshot(&self, elapsed: Duration) -> ProgressUpdate {
        ProgressUpdate {
            scanned: self.scanned,
            hashed: self.hashed,
            cache_hits: self.cache_hits,
            errors: self.errors.len(),
            elapsed,
        }
    }
}

/// Builds a [`FingerprintIndex`] for a directory tree.
pub struct DirectoryIndexer {
    config: IndexerConfig,
    digester: Arc<dyn Digester>,
}

impl DirectoryIndexer {
    /// Create an indexer that digests through `digester`.
    #[must_use]
    pub fn new(config: IndexerConfig, digester: Arc<dyn Digester>) -> Self {
        Self { config, digester }
    }

    /// Create an indexer backed by a streaming [`Hasher`].
    #[must_use]
    pub fn with_algorithm(config: IndexerConfig, algorithm: HashAlgorithm) -> Self {
        let mut hasher = Hasher::new(algorithm);
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }
        Self::new(config, Arc::new(hasher))
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Index the tree rooted at `root`.
    ///
    /// `phase` names the tree in progress reports and logs. The cache is
    /// consulted before hashing, updated with every new fingerprint, and
    /// persisted once the walk ends (and at checkpoints along the way).
    pub fn index(
        &self,
        phase: &str,
        root: &Path,
        cache: &mut FingerprintCache,
    ) -> (FingerprintIndex, IndexStats) {
        let started = Instant::now();
        let mut index = FingerprintIndex::new(root);
        let mut stats = IndexStats::default();
        let mut ticker = ProgressTicker::new(self.config.cadence, started);

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase, root);
        }

        let use_cache = cache.algorithm() == self.digester.algorithm();
        if !use_cache {
            log::warn!(
                "Fingerprint cache holds {} digests but indexing uses {}; cache bypassed",
                cache.algorithm(),
                self.digester.algorithm()
            );
        }

        match fs::metadata(root) {
            Ok(m) if m.is_dir() => {
                self.walk_tree(root, cache, use_cache, &mut index, &mut stats, &mut ticker);
            }
            Ok(_) => {
                log::error!("Not a directory: {}", root.display());
                stats
                    .errors
                    .push(ScanError::NotADirectory(root.to_path_buf()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "{} tree {} does not exist, treating it as empty",
                    phase,
                    root.display()
                );
            }
            Err(e) => {
                log::error!("Cannot read {}: {}", root.display(), e);
                stats.errors.push(ScanError::Io {
                    path: root.to_path_buf(),
                    source: e,
                });
            }
        }

        if self.config.is_shutdown_requested() {
            stats.interrupted = true;
            log::info!("Indexing of {} interrupted by shutdown signal", root.display());
        }

        if use_cache {
            if let Err(e) = cache.persist() {
                log::error!("Failed to save fingerprint cache: {}", e);
                stats.cache_persist_failed = true;
            }
        }

        stats.duration = started.elapsed();
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase, &stats.snapshot(stats.duration));
        }

        log::info!(
            "[DONE] Indexed {} files from {} ({} hashed, {} cached, {} errors)",
            stats.scanned,
            root.display(),
            stats.hashed,
            stats.cache_hits,
            stats.errors.len()
        );

        (index, stats)
    }

    fn walk_tree(
        &self,
        root: &Path,
        cache: &mut FingerprintCache,
        use_cache: bool,
        index: &mut FingerprintIndex,
        stats: &mut IndexStats,
        ticker: &mut ProgressTicker,
    ) {
        let pool = self.build_pool();
        let mut walker = Walker::new(root, self.config.walker.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let batch_size = self.config.batch_size.max(1);
        let mut batch: Vec<FileEntry> = Vec::with_capacity(batch_size);

        for item in walker.walk() {
            match item {
                Ok(entry) => {
                    batch.push(entry);
                    if batch.len() >= batch_size {
                        self.process_batch(
                            &mut batch,
                            pool.as_ref(),
                            cache,
                            use_cache,
                            index,
                            stats,
                            ticker,
                        );
                    }
                }
                Err(e) => {
                    log::warn!("Skipped: {}", e);
                    stats.errors.push(e);
                }
            }
        }

        if !batch.is_empty() {
            self.process_batch(
                &mut batch,
                pool.as_ref(),
                cache,
                use_cache,
                index,
                stats,
                ticker,
            );
        }
    }

    /// Build the hashing pool. `None` means hash on the calling thread.
    fn build_pool(&self) -> Option<rayon::ThreadPool> {
        if self.config.io_threads <= 1 {
            return None;
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!("Failed to create hashing thread pool, hashing sequentially: {}", e);
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_batch(
        &self,
        batch: &mut Vec<FileEntry>,
        pool: Option<&rayon::ThreadPool>,
        cache: &mut FingerprintCache,
        use_cache: bool,
        index: &mut FingerprintIndex,
        stats: &mut IndexStats,
        ticker: &mut ProgressTicker,
    ) {
        let root = index.root().to_path_buf();
        let mut results: Vec<Option<Result<Fingerprint, HashError>>> =
            Vec::with_capacity(batch.len());
        let mut misses: Vec<usize> = Vec::new();

        for (i, entry) in batch.iter().enumerate() {
            let hit = if use_cache {
                cache.lookup(&entry.path, entry.modified)
            } else {
                None
            };
            match hit {
                Some(fp) => {
                    log::trace!("Cache hit: {}", entry.path.display());
                    results.push(Some(Ok(fp)));
                }
                None => {
                    results.push(None);
                    misses.push(i);
                }
            }
        }

        let entries: &[FileEntry] = batch;
        let computed: Vec<(usize, Result<Fingerprint, HashError>)> = match pool {
            Some(pool) => pool.install(|| {
                misses
                    .par_iter()
                    .map(|&i| (i, self.digest_checked(&entries[i])))
                    .collect()
            }),
            None => misses
                .iter()
                .map(|&i| (i, self.digest_checked(&entries[i])))
                .collect(),
        };

        let mut from_cache = vec![true; batch.len()];
        for (i, result) in computed {
            from_cache[i] = false;
            results[i] = Some(result);
        }

        for ((entry, result), cached) in batch.drain(..).zip(results).zip(from_cache) {
            let result =
                result.unwrap_or_else(|| Err(HashError::Interrupted(entry.path.clone())));

            match result {
                Err(HashError::Interrupted(_)) => continue,
                Ok(fingerprint) => {
                    stats.scanned += 1;
                    if cached {
                        stats.cache_hits += 1;
                    } else {
                        stats.hashed += 1;
                        stats.bytes_hashed += entry.size;
                        if use_cache {
                            cache.record(&entry.path, entry.modified, &fingerprint);
                        }
                    }

                    let record = FileRecord::new(
                        &root,
                        entry.path,
                        entry.size,
                        entry.modified,
                        fingerprint,
                    );
                    if !index.insert(record) {
                        stats.shadowed += 1;
                    }
                }
                Err(e) => {
                    stats.scanned += 1;
                    log::warn!("Failed: {} ({})", entry.path.display(), e);
                    stats.errors.push(ScanError::Hash(e));
                }
            }

            let now = Instant::now();
            if ticker.should_report(stats.scanned, now) {
                if let Some(ref callback) = self.config.progress_callback {
                    callback.on_progress(&stats.snapshot(ticker.elapsed(now)));
                }
            }
        }

        let every = self.config.checkpoint_every;
        if use_cache && every > 0 && cache.pending_writes() >= every {
            match cache.persist() {
                Ok(true) => log::debug!("Fingerprint cache checkpoint written"),
                Ok(false) => {}
                Err(e) => log::warn!("Fingerprint cache checkpoint failed: {}", e),
            }
        }
    }

    /// Digest `entry`, rejecting the result if the file changed meanwhile.
    fn digest_checked(&self, entry: &FileEntry) -> Result<Fingerprint, HashError> {
        if self.config.is_shutdown_requested() {
            return Err(HashError::Interrupted(entry.path.clone()));
        }

        let fingerprint = self.digester.digest(&entry.path)?;

        let after =
            fs::symlink_metadata(&entry.path).map_err(|e| HashError::from_io(&entry.path, e))?;
        let modified = after.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if after.len() != entry.size || modified != entry.modified {
            return Err(HashError::Modified(entry.path.clone()));
        }

        Ok(fingerprint)
    }
}
