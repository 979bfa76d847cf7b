use filetime::{set_file_mtime, FileTime};
use photosync::actions::{DuplicatePolicy, TransferConfig, TransferMode};
use photosync::cache::FingerprintCache;
use photosync::error::ExitCode;
use photosync::plan::Layout;
use photosync::scanner::HashAlgorithm;
use photosync::sync::{SyncOptions, SyncPipeline};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn mirror_options(src: &Path, dst: &Path, transfer: TransferConfig) -> SyncOptions {
    let mut options = SyncOptions::new(src, dst);
    options.layout = Layout::Mirror;
    options.transfer = transfer;
    options
}

#[test]
fn test_move_then_rerun_is_idempotent() {
    let work = TempDir::new().unwrap();
    let src = work.path().join("duplicates");
    let dst = work.path().join("sorted");
    let cache_path = work.path().join("hash_cache.json");
    write(&src, "phone/a.jpg", b"a");
    write(&src, "phone/b.jpg", b"b");
    write(&dst, "phone/a_original.jpg", b"a");

    let options = mirror_options(&src, &dst, TransferConfig::default().with_dry_run(false));
    let pipeline = SyncPipeline::with_algorithm(options, HashAlgorithm::Md5);

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    let (report, _) = pipeline.run(&mut cache);
    assert_eq!(report.plan.new, 1);
    assert_eq!(report.plan.skip, 1);
    assert_eq!(report.transfer.transferred, 1);
    assert_eq!(fs::read(dst.join("phone/b.jpg")).unwrap(), b"b");
    assert!(!src.join("phone/b.jpg").exists());
    assert!(src.join("phone/a.jpg").exists());
    assert_eq!(
        ExitCode::for_outcome(report.interrupted, report.has_errors()),
        ExitCode::Success
    );

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    let (rerun, plan) = pipeline.run(&mut cache);
    assert_eq!(rerun.plan.new, 0);
    assert_eq!(rerun.plan.skip, 1);
    assert_eq!(rerun.transfer.transferred, 0);
    assert_eq!(rerun.source.hashed, 0);
    assert_eq!(rerun.source.cache_hits, 1);
    assert_eq!(plan.len(), 1);
}

#[test]
fn test_copy_preserves_mtime() {
    let work = TempDir::new().unwrap();
    let src = work.path().join("duplicates");
    let dst = work.path().join("sorted");
    let photo = write(&src, "a.jpg", b"pixels");
    set_file_mtime(&photo, FileTime::from_unix_time(1_400_000_000, 0)).unwrap();

    let options = mirror_options(
        &src,
        &dst,
        TransferConfig::default()
            .with_dry_run(false)
            .with_mode(TransferMode::Copy),
    );
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (report, _) = SyncPipeline::with_algorithm(options, HashAlgorithm::Md5).run(&mut cache);

    assert_eq!(report.transfer.transferred, 1);
    assert_eq!(report.transfer.bytes_transferred, 6);
    let copied = fs::metadata(dst.join("a.jpg")).unwrap();
    assert_eq!(
        FileTime::from_last_modification_time(&copied),
        FileTime::from_unix_time(1_400_000_000, 0)
    );
    assert!(photo.exists());
}

#[test]
fn test_duplicates_deleted_when_counterpart_exists() {
    let work = TempDir::new().unwrap();
    let src = work.path().join("duplicates");
    let dst = work.path().join("sorted");
    let dup = write(&src, "old/a.jpg", b"a");
    write(&dst, "2020/01/a.jpg", b"a");

    let options = mirror_options(
        &src,
        &dst,
        TransferConfig::default()
            .with_dry_run(false)
            .with_duplicates(DuplicatePolicy::Delete),
    );
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (report, _) = SyncPipeline::with_algorithm(options, HashAlgorithm::Md5).run(&mut cache);

    assert_eq!(report.transfer.duplicates_removed, 1);
    assert_eq!(report.transfer.bytes_freed, 1);
    assert!(!dup.exists());
    assert!(dst.join("2020/01/a.jpg").exists());
}

#[test]
fn test_existing_target_is_never_overwritten() {
    let work = TempDir::new().unwrap();
    let src = work.path().join("duplicates");
    let dst = work.path().join("sorted");
    // b/one.jpg is a shadowed duplicate in the library, so its path is not
    // reserved by the planner; the executor must still refuse to replace it.
    write(&dst, "a/one.jpg", b"library");
    write(&dst, "b/one.jpg", b"library");
    write(&src, "b/one.jpg", b"new content");

    let options = mirror_options(&src, &dst, TransferConfig::default().with_dry_run(false));
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (report, _) = SyncPipeline::with_algorithm(options, HashAlgorithm::Md5).run(&mut cache);

    assert_eq!(report.plan.new, 1);
    assert_eq!(report.transfer.transferred, 0);
    assert_eq!(report.transfer.failure_count(), 1);
    assert_eq!(fs::read(dst.join("b/one.jpg")).unwrap(), b"library");
    assert!(src.join("b/one.jpg").exists());
    assert_eq!(
        ExitCode::for_outcome(report.interrupted, report.has_errors()),
        ExitCode::PartialSuccess
    );
}

#[test]
fn test_missing_destination_is_created() {
    let work = TempDir::new().unwrap();
    let src = work.path().join("duplicates");
    let dst = work.path().join("sorted");
    write(&src, "a.jpg", b"a");

    let options = mirror_options(&src, &dst, TransferConfig::default().with_dry_run(false));
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (report, _) = SyncPipeline::with_algorithm(options, HashAlgorithm::Md5).run(&mut cache);

    assert_eq!(report.destination.scanned, 0);
    assert_eq!(report.transfer.transferred, 1);
    assert!(dst.join("a.jpg").exists());
}

#[test]
fn test_shadowed_destination_name_is_not_reused() {
    let work = TempDir::new().unwrap();
    let src = work.path().join("duplicates");
    let dst = work.path().join("sorted");
    write(&dst, "a.jpg", b"library shot");
    write(&dst, "b.jpg", b"library shot");
    write(&src, "b.jpg", b"new shot");

    let options = mirror_options(&src, &dst, TransferConfig::default().with_dry_run(false));
    let pipeline = SyncPipeline::with_algorithm(options, HashAlgorithm::Md5);

    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (report, plan) = pipeline.run(&mut cache);
    assert_eq!(report.destination.shadowed, 1);
    assert_eq!(report.plan.new, 1);
    assert_eq!(report.transfer.transferred, 1);
    assert!(report.transfer.failures.is_empty());
    assert_eq!(
        plan.transfers().map(|(_, target)| target.to_path_buf()).collect::<Vec<_>>(),
        vec![photosync::sync::resolve(&dst).join("b_1.jpg")]
    );
    assert_eq!(fs::read(dst.join("b_1.jpg")).unwrap(), b"new shot");
    assert_eq!(fs::read(dst.join("b.jpg")).unwrap(), b"library shot");
    assert!(!src.join("b.jpg").exists());

    let (rerun, _) = pipeline.run(&mut cache);
    assert_eq!(rerun.plan.new, 0);
    assert!(!rerun.has_errors());
}
