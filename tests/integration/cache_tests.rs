use filetime::{set_file_mtime, FileTime};
use photosync::cache::{CacheKey, FingerprintCache};
use photosync::scanner::{Fingerprint, HashAlgorithm, Hasher};
use std::fs;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

const MD5_ABC: &str = "900150983cd24fb0d6963f7d28e17f72";

#[test]
fn test_persist_and_reload() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("state/hash_cache.json");
    let photo = dir.path().join("a.jpg");
    let mtime = UNIX_EPOCH + Duration::from_secs(1_600_000_000);

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    assert!(cache.is_empty());
    cache.record(&photo, mtime, &Fingerprint::from_hex(MD5_ABC));
    assert_eq!(cache.pending_writes(), 1);
    assert!(cache.persist().unwrap());
    assert_eq!(cache.pending_writes(), 0);

    let reloaded = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(
        reloaded.lookup(&photo, mtime),
        Some(Fingerprint::from_hex(MD5_ABC))
    );
}

#[test]
fn test_document_layout() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("hash_cache.json");
    let photo = dir.path().join("a.jpg");
    let mtime = UNIX_EPOCH + Duration::new(1_600_000_000, 123);

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    cache.record(&photo, mtime, &Fingerprint::from_hex(MD5_ABC));
    cache.persist().unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&cache_path).unwrap()).unwrap();
    assert_eq!(value["version"], 1);
    assert_eq!(value["algorithm"], "md5");

    let key = format!("{}:1600000000000000123", photo.to_string_lossy());
    assert_eq!(CacheKey::new(&photo, mtime).as_str(), key);
    assert_eq!(value["entries"][key.as_str()], MD5_ABC);
}

#[test]
fn test_unchanged_cache_is_not_rewritten() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("hash_cache.json");

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    assert!(!cache.persist().unwrap());
    assert!(!cache_path.exists());
}

#[test]
fn test_in_memory_cache_never_touches_disk() {
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    cache.record(
        std::path::Path::new("/sorted/a.jpg"),
        UNIX_EPOCH,
        &Fingerprint::from_hex(MD5_ABC),
    );
    assert_eq!(cache.len(), 1);
    assert!(cache.path().is_none());
    assert!(!cache.persist().unwrap());
}

#[test]
fn test_mtime_change_is_a_miss() {
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("a.jpg");
    fs::write(&photo, b"abc").unwrap();
    set_file_mtime(&photo, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    let mtime = fs::metadata(&photo).unwrap().modified().unwrap();

    let fingerprint = Hasher::new(HashAlgorithm::Md5).digest(&photo).unwrap();
    assert_eq!(fingerprint.as_str(), MD5_ABC);

    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    cache.record(&photo, mtime, &fingerprint);

    set_file_mtime(&photo, FileTime::from_unix_time(1_600_000_001, 0)).unwrap();
    let touched = fs::metadata(&photo).unwrap().modified().unwrap();
    assert!(cache.lookup(&photo, touched).is_none());
    assert!(cache.lookup(&photo, mtime).is_some());
}

#[test]
fn test_algorithm_mismatch_starts_empty() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("hash_cache.json");

    let mut md5 = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    md5.record(
        &dir.path().join("a.jpg"),
        UNIX_EPOCH,
        &Fingerprint::from_hex(MD5_ABC),
    );
    md5.persist().unwrap();

    let sha = FingerprintCache::load(&cache_path, HashAlgorithm::Sha256);
    assert!(sha.is_empty());
    assert_eq!(sha.algorithm(), HashAlgorithm::Sha256);
}

#[test]
fn test_clear_then_persist_writes_empty_document() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("hash_cache.json");

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    cache.record(
        &dir.path().join("a.jpg"),
        UNIX_EPOCH,
        &Fingerprint::from_hex(MD5_ABC),
    );
    cache.persist().unwrap();

    cache.clear();
    assert!(cache.persist().unwrap());
    assert!(FingerprintCache::load(&cache_path, HashAlgorithm::Md5).is_empty());
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_unicode_names_do_not_share_entries() {
    use photosync::index::{DirectoryIndexer, IndexerConfig};
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("hash_cache.json");
    let tree = dir.path().join("dups");
    fs::create_dir_all(&tree).unwrap();

    let unique = tree.join(OsStr::from_bytes(b"\xfe.jpg"));
    let copy = tree.join(OsStr::from_bytes(b"\xff.jpg"));
    fs::write(&unique, b"only copy").unwrap();
    fs::write(&copy, b"library content").unwrap();
    let pinned = FileTime::from_unix_time(1_600_000_000, 0);
    set_file_mtime(&unique, pinned).unwrap();
    set_file_mtime(&copy, pinned).unwrap();

    let indexer = DirectoryIndexer::with_algorithm(IndexerConfig::default(), HashAlgorithm::Md5);

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    let (cold, cold_stats) = indexer.index("source", &tree, &mut cache);
    assert_eq!(cold.len(), 2);
    assert_eq!(cold_stats.hashed, 2);
    assert_eq!(cache.len(), 2);

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    assert_eq!(cache.len(), 2);
    let (warm, warm_stats) = indexer.index("source", &tree, &mut cache);
    assert_eq!(warm_stats.cache_hits, 2);
    assert_eq!(warm_stats.shadowed, 0);
    assert_eq!(warm, cold);

    let hasher = Hasher::new(HashAlgorithm::Md5);
    assert!(warm.contains(&hasher.digest(&unique).unwrap()));
    assert!(warm.contains(&hasher.digest(&copy).unwrap()));
}
