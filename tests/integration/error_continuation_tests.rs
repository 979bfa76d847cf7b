use photosync::actions::TransferConfig;
use photosync::cache::FingerprintCache;
use photosync::error::ExitCode;
use photosync::index::{DirectoryIndexer, IndexerConfig};
use photosync::scanner::{Digester, Fingerprint, HashAlgorithm, HashError, Hasher, ScanError};
use photosync::sync::{SyncOptions, SyncPipeline};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Fails every file whose name contains "corrupt".
struct FlakyDigester(Hasher);

impl Digester for FlakyDigester {
    fn digest(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if name.contains("corrupt") {
            return Err(HashError::PermissionDenied(path.to_path_buf()));
        }
        self.0.digest(path)
    }

    fn algorithm(&self) -> HashAlgorithm {
        self.0.algorithm()
    }
}

fn flaky() -> Arc<FlakyDigester> {
    Arc::new(FlakyDigester(Hasher::new(HashAlgorithm::Md5)))
}

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_unreadable_file_is_skipped_and_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.jpg", b"a");
    let bad = write(dir.path(), "b_corrupt.jpg", b"b");
    write(dir.path(), "c.jpg", b"c");

    let indexer = DirectoryIndexer::new(IndexerConfig::default(), flaky());
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (index, stats) = indexer.index("source", dir.path(), &mut cache);

    assert_eq!(index.len(), 2);
    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.error_count(), 1);
    match &stats.errors[0] {
        ScanError::Hash(HashError::PermissionDenied(path)) => assert_eq!(*path, bad),
        other => panic!("unexpected error: {other:?}"),
    }
    // failures are never cached
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_sync_continues_past_failures() {
    let work = TempDir::new().unwrap();
    let src = work.path().join("duplicates");
    let dst = work.path().join("sorted");
    write(&src, "a.jpg", b"a");
    write(&src, "corrupt.jpg", b"x");
    write(&src, "z.jpg", b"z");

    let mut options = SyncOptions::new(&src, &dst);
    options.transfer = TransferConfig::default().with_dry_run(true);
    let pipeline = SyncPipeline::new(options, flaky());
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (report, plan) = pipeline.run(&mut cache);

    assert_eq!(plan.new_count(), 2);
    assert!(plan
        .transfers()
        .all(|(record, _)| !record.path.ends_with("corrupt.jpg")));
    assert_eq!(report.source.errors.len(), 1);
    assert!(report.has_errors());
    assert_eq!(
        ExitCode::for_outcome(report.interrupted, report.has_errors()),
        ExitCode::PartialSuccess
    );
}

#[test]
fn test_vanished_source_fails_only_that_transfer() {
    use photosync::actions::{TransferError, TransferExecutor};
    use photosync::plan::PlacementAction;

    let work = TempDir::new().unwrap();
    let src = work.path().join("duplicates");
    let dst = work.path().join("sorted");
    write(&src, "a.jpg", b"a");
    write(&src, "b.jpg", b"b");

    let mut options = SyncOptions::new(&src, &dst);
    options.transfer = TransferConfig::default().with_dry_run(true);
    let (_, plan) =
        SyncPipeline::with_algorithm(options, HashAlgorithm::Md5)
            .run(&mut FingerprintCache::in_memory(HashAlgorithm::Md5));
    assert_eq!(plan.new_count(), 2);

    fs::remove_file(src.join("a.jpg")).unwrap();

    let executor = TransferExecutor::new(TransferConfig::default().with_dry_run(false));
    let first = plan.actions().first().unwrap();
    assert!(matches!(first, PlacementAction::Transfer { .. }));
    assert!(matches!(
        executor.apply(first),
        Err(TransferError::SourceMissing(_))
    ));

    let report = executor.apply_all(&plan);
    assert_eq!(report.transferred, 1);
    assert_eq!(report.failure_count(), 1);
}
