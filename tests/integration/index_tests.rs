use filetime::{set_file_mtime, FileTime};
use photosync::cache::FingerprintCache;
use photosync::index::{DirectoryIndexer, IndexerConfig};
use photosync::scanner::{
    Digester, Fingerprint, HashAlgorithm, HashError, Hasher, IgnoreList, WalkerConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

struct CountingDigester {
    inner: Hasher,
    calls: AtomicUsize,
}

impl CountingDigester {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Hasher::new(HashAlgorithm::Md5),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Digester for CountingDigester {
    fn digest(&self, path: &Path) -> Result<Fingerprint, HashError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.digest(path)
    }

    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Md5
    }
}

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_first_seen_wins_in_sorted_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "b/photo.jpg", b"same");
    write(dir.path(), "a/copy.jpg", b"same");
    write(dir.path(), "a/z.jpg", b"other");

    for threads in [1, 4] {
        let config = IndexerConfig::default()
            .with_io_threads(threads)
            .with_batch_size(2);
        let indexer = DirectoryIndexer::with_algorithm(config, HashAlgorithm::Md5);
        let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
        let (index, stats) = indexer.index("destination", dir.path(), &mut cache);

        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.shadowed, 1);
        assert_eq!(index.len(), 2);
        let fp = Hasher::new(HashAlgorithm::Md5)
            .digest(&dir.path().join("b/photo.jpg"))
            .unwrap();
        assert_eq!(
            index.get(&fp).unwrap().relative,
            PathBuf::from("a/copy.jpg")
        );
    }
}

#[test]
fn test_warm_run_hashes_nothing() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("cache/hash_cache.json");
    let tree = dir.path().join("sorted");
    for i in 0..10 {
        write(&tree, &format!("2020/0{}/{i}.jpg", i % 3 + 1), format!("{i}").as_bytes());
    }

    let digester = CountingDigester::new();
    let indexer = DirectoryIndexer::new(IndexerConfig::default(), digester.clone());

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    let (cold, cold_stats) = indexer.index("destination", &tree, &mut cache);
    assert_eq!(cold_stats.hashed, 10);
    assert_eq!(digester.calls(), 10);
    assert!(cache_path.exists());

    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    let (warm, warm_stats) = indexer.index("destination", &tree, &mut cache);
    assert_eq!(warm_stats.hashed, 0);
    assert_eq!(warm_stats.cache_hits, 10);
    assert_eq!(digester.calls(), 10);
    assert_eq!(cold, warm);
}

#[test]
fn test_touched_file_is_rehashed() {
    let dir = TempDir::new().unwrap();
    let photo = write(dir.path(), "a.jpg", b"one");
    write(dir.path(), "b.jpg", b"two");
    set_file_mtime(&photo, FileTime::from_unix_time(1_500_000_000, 0)).unwrap();

    let digester = CountingDigester::new();
    let indexer = DirectoryIndexer::new(IndexerConfig::default(), digester.clone());
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    indexer.index("source", dir.path(), &mut cache);
    assert_eq!(digester.calls(), 2);

    fs::write(&photo, b"edited").unwrap();
    set_file_mtime(&photo, FileTime::from_unix_time(1_500_000_100, 0)).unwrap();

    let (index, stats) = indexer.index("source", dir.path(), &mut cache);
    assert_eq!(digester.calls(), 3);
    assert_eq!(stats.hashed, 1);
    assert_eq!(stats.cache_hits, 1);
    let edited = Hasher::new(HashAlgorithm::Md5).digest(&photo).unwrap();
    assert!(index.contains(&edited));
}

#[test]
fn test_ignored_directories_and_extensions() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "2020/01/a.JPG", b"a");
    write(dir.path(), "2020/01/notes.txt", b"n");
    write(dir.path(), "@eaDir/a.JPG/SYNOPHOTO_THUMB_S.jpg", b"thumb");
    write(dir.path(), "Cache/b.jpg", b"b");

    let walker = WalkerConfig {
        ignore: IgnoreList::new(["@eaDir", "tmp", "cache"]),
        ..WalkerConfig::default()
    }
    .with_extensions(["jpg"]);
    let indexer = DirectoryIndexer::with_algorithm(
        IndexerConfig::default().with_walker_config(walker),
        HashAlgorithm::Md5,
    );
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (index, stats) = indexer.index("destination", dir.path(), &mut cache);

    assert_eq!(stats.scanned, 1);
    let paths: Vec<_> = index.iter().map(|r| r.relative.clone()).collect();
    assert_eq!(paths, vec![PathBuf::from("2020/01/a.JPG")]);
}

#[test]
fn test_missing_root_is_empty() {
    let dir = TempDir::new().unwrap();
    let indexer = DirectoryIndexer::with_algorithm(IndexerConfig::default(), HashAlgorithm::Md5);
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (index, stats) = indexer.index("destination", &dir.path().join("absent"), &mut cache);

    assert!(index.is_empty());
    assert_eq!(stats.error_count(), 0);
    assert!(!stats.interrupted);
}

#[test]
fn test_file_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "a.jpg", b"a");
    let indexer = DirectoryIndexer::with_algorithm(IndexerConfig::default(), HashAlgorithm::Md5);
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (index, stats) = indexer.index("source", &file, &mut cache);

    assert!(index.is_empty());
    assert_eq!(stats.error_count(), 1);
}

#[test]
fn test_checkpoints_persist_during_walk() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("hash_cache.json");
    let tree = dir.path().join("tree");
    for i in 0..6 {
        write(&tree, &format!("{i}.jpg"), format!("{i}").as_bytes());
    }

    let indexer = DirectoryIndexer::with_algorithm(
        IndexerConfig::default()
            .with_batch_size(1)
            .with_checkpoint_every(2),
        HashAlgorithm::Md5,
    );
    let mut cache = FingerprintCache::load(&cache_path, HashAlgorithm::Md5);
    indexer.index("source", &tree, &mut cache);

    assert_eq!(cache.pending_writes(), 0);
    assert_eq!(FingerprintCache::load(&cache_path, HashAlgorithm::Md5).len(), 6);
}

#[test]
fn test_mismatched_cache_is_bypassed() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.jpg", b"a");

    let indexer = DirectoryIndexer::with_algorithm(IndexerConfig::default(), HashAlgorithm::Sha256);
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    let (index, stats) = indexer.index("source", dir.path(), &mut cache);

    assert_eq!(index.len(), 1);
    assert_eq!(stats.hashed, 1);
    assert!(cache.is_empty());
}
