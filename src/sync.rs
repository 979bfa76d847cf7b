//! End-to-end sync pipeline.
//!
//! `index(destination) → index(source) → plan → execute`, sharing one
//! fingerprint cache across both trees.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::actions::{TransferConfig, TransferExecutor, TransferReport};
use crate::cache::FingerprintCache;
use crate::index::{DirectoryIndexer, FingerprintIndex, IndexStats, IndexerConfig};
use crate::plan::{
    self, DateGranularity, DateLayout, DateSource, Layout, MirrorLayout, PlacementStrategy, Plan,
    PlanSummary,
};
use crate::scanner::{Digester, HashAlgorithm, Hasher};

/// Options for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Tree holding candidate files ("duplicates")
    pub source: PathBuf,
    /// Organized tree ("sorted")
    pub destination: PathBuf,
    /// Indexer settings shared by both trees
    pub indexer: IndexerConfig,
    /// Destination layout for new files
    pub layout: Layout,
    /// Date oracle for the date layout
    pub date_source: DateSource,
    /// Bucket depth for the date layout
    pub granularity: DateGranularity,
    /// Bucket for files without a date
    pub unknown_bucket: String,
    /// Executor settings
    pub transfer: TransferConfig,
    /// Files never indexed (cache file, log file)
    pub excluded_files: Vec<PathBuf>,
}

impl SyncOptions {
    /// Defaults for syncing `source` into `destination`.
    #[must_use]
    pub fn new(source: &Path, destination: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            indexer: IndexerConfig::default(),
            layout: Layout::Date,
            date_source: DateSource::Modified,
            granularity: DateGranularity::Month,
            unknown_bucket: "unknown".to_string(),
            transfer: TransferConfig::default(),
            excluded_files: Vec::new(),
        }
    }

    /// Placement strategy rooted at `destination`.
    #[must_use]
    pub fn strategy(&self, destination: &Path) -> Box<dyn PlacementStrategy> {
        match self.layout {
            Layout::Mirror => Box::new(MirrorLayout::new(destination)),
            Layout::Date => Box::new(
                DateLayout::new(destination)
                    .with_oracle(self.date_source.oracle())
                    .with_granularity(self.granularity)
                    .with_unknown_bucket(self.unknown_bucket.clone()),
            ),
        }
    }
}

/// Per-tree indexing summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeReport {
    /// Indexed root
    pub root: PathBuf,
    /// Regular files visited
    pub scanned: usize,
    /// Distinct fingerprints
    pub unique: usize,
    /// Fingerprints computed
    pub hashed: usize,
    /// Fingerprints served from the cache
    pub cache_hits: usize,
    /// In-tree duplicates
    pub shadowed: usize,
    /// Bytes read while hashing
    pub bytes_hashed: u64,
    /// Error messages, one per skipped file or directory
    pub errors: Vec<String>,
    /// Whether indexing was cut short
    pub interrupted: bool,
    /// Whether the cache could not be written
    pub cache_persist_failed: bool,
    /// Seconds spent indexing
    pub duration_secs: f64,
}

impl TreeReport {
    /// Summarize one indexing pass.
    #[must_use]
    pub fn new(index: &FingerprintIndex, stats: &IndexStats) -> Self {
        Self {
            root: index.root().to_path_buf(),
            scanned: stats.scanned,
            unique: index.len(),
            hashed: stats.hashed,
            cache_hits: stats.cache_hits,
            shadowed: stats.shadowed,
            bytes_hashed: stats.bytes_hashed,
            errors: stats.errors.iter().map(ToString::to_string).collect(),
            interrupted: stats.interrupted,
            cache_persist_failed: stats.cache_persist_failed,
            duration_secs: stats.duration.as_secs_f64(),
        }
    }
}

/// Result of a sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Destination indexing
    pub destination: TreeReport,
    /// Source indexing
    pub source: TreeReport,
    /// Plan counts
    pub plan: PlanSummary,
    /// Executor results (empty when execution was skipped)
    pub transfer: TransferReport,
    /// Whether the plan was only logged
    pub dry_run: bool,
    /// Whether the run was cut short by a shutdown request
    pub interrupted: bool,
    /// Total wall-clock seconds
    pub elapsed_secs: f64,
}

impl SyncReport {
    /// Indexing errors plus transfer failures.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.destination.errors.len() + self.source.errors.len() + self.transfer.failure_count()
    }

    /// Whether anything failed along the way.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
            || self.destination.cache_persist_failed
            || self.source.cache_persist_failed
    }
}

/// Runs the sync pipeline.
pub struct SyncPipeline {
    options: SyncOptions,
    digester: Arc<dyn Digester>,
}

impl SyncPipeline {
    /// Pipeline digesting through `digester`.
    #[must_use]
    pub fn new(options: SyncOptions, digester: Arc<dyn Digester>) -> Self {
        Self { options, digester }
    }

    /// Pipeline backed by a streaming [`Hasher`].
    #[must_use]
    pub fn with_algorithm(options: SyncOptions, algorithm: HashAlgorithm) -> Self {
        let mut hasher = Hasher::new(algorithm);
        if let Some(ref flag) = options.indexer.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }
        Self::new(options, Arc::new(hasher))
    }

    /// Index both trees, plan, and apply the plan.
    ///
    /// The returned [`Plan`] is the one that was applied (or logged, for a
    /// dry run). Execution is skipped when indexing was interrupted, since
    /// a partial destination index would make known content look new.
    pub fn run(&self, cache: &mut FingerprintCache) -> (SyncReport, Plan) {
        let started = Instant::now();
        log::info!("Starting photo sync...");

        let destination = resolve(&self.options.destination);
        let source = resolve(&self.options.source);

        let mut indexer_config = self.options.indexer.clone();
        let excluded = self
            .options
            .excluded_files
            .iter()
            .map(PathBuf::as_path)
            .chain(cache.path());
        for path in excluded {
            indexer_config.walker = indexer_config.walker.with_excluded_file(resolve(path));
        }
        let indexer = DirectoryIndexer::new(indexer_config, Arc::clone(&self.digester));

        let mut report = SyncReport {
            dry_run: self.options.transfer.dry_run,
            ..SyncReport::default()
        };

        let (dest_index, dest_stats) = indexer.index("destination", &destination, cache);
        report.destination = TreeReport::new(&dest_index, &dest_stats);
        if dest_stats.interrupted {
            return self.finish(report, Plan::default(), started);
        }

        let (source_index, source_stats) = indexer.index("source", &source, cache);
        report.source = TreeReport::new(&source_index, &source_stats);
        if source_stats.interrupted {
            return self.finish(report, Plan::default(), started);
        }

        let strategy = self.options.strategy(&destination);
        let plan = plan::plan_around(
            &dest_index,
            &source_index,
            strategy.as_ref(),
            plan::exists_on_disk,
        );
        report.plan = plan.summary();

        let executor = TransferExecutor::new(self.options.transfer.clone());
        report.transfer = executor.apply_all(&plan);

        self.finish(report, plan, started)
    }

    fn finish(&self, mut report: SyncReport, plan: Plan, started: Instant) -> (SyncReport, Plan) {
        report.interrupted = report.destination.interrupted
            || report.source.interrupted
            || report.transfer.interrupted;
        let elapsed = started.elapsed();
        report.elapsed_secs = elapsed.as_secs_f64();

        if report.interrupted {
            log::warn!("Sync interrupted after {:.1} minutes", minutes(elapsed));
        } else {
            log::info!("Sync completed in {:.1} minutes", minutes(elapsed));
        }
        (report, plan)
    }
}

fn minutes(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() / 60.0
}

/// Canonical form of `path`, resolving the parent when the path itself
/// does not exist yet. Unresolvable paths are returned unchanged.
#[must_use]
pub fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
