use chrono::{Local, TimeZone};
use filetime::{set_file_mtime, FileTime};
use photosync::cache::FingerprintCache;
use photosync::index::{DirectoryIndexer, FingerprintIndex, IndexerConfig};
use photosync::plan::{
    self, DateGranularity, DateLayout, DateSource, MirrorLayout, PlacementAction,
};
use photosync::scanner::HashAlgorithm;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn pin_local_noon(path: &Path, y: i32, m: u32, d: u32) {
    let ts = Local
        .with_ymd_and_hms(y, m, d, 12, 0, 0)
        .single()
        .unwrap()
        .timestamp();
    set_file_mtime(path, FileTime::from_unix_time(ts, 0)).unwrap();
}

fn index(root: &Path) -> FingerprintIndex {
    let indexer = DirectoryIndexer::with_algorithm(IndexerConfig::default(), HashAlgorithm::Md5);
    let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
    indexer.index("tree", root, &mut cache).0
}

#[test]
fn test_new_and_known_files() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    write(dst.path(), "2019/07/beach.jpg", b"beach");
    write(src.path(), "import/renamed_beach.jpg", b"beach");
    let fresh = write(src.path(), "import/party.jpg", b"party");
    pin_local_noon(&fresh, 2021, 3, 14);

    let dest_index = index(dst.path());
    let source_index = index(src.path());
    let layout = DateLayout::new(dst.path());
    let plan = plan::plan(&dest_index, &source_index, &layout);

    assert_eq!(plan.new_count(), 1);
    assert_eq!(plan.skip_count(), 1);

    let transfers: Vec<_> = plan.transfers().collect();
    assert_eq!(transfers[0].0.path, fresh);
    assert_eq!(transfers[0].1, dst.path().join("2021/03/party.jpg"));

    let skips: Vec<_> = plan.skips().collect();
    assert_eq!(skips[0].1, dst.path().join("2019/07/beach.jpg"));
}

#[test]
fn test_day_granularity_from_file_name() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    write(src.path(), "IMG_20230514_101500.jpg", b"a");
    write(src.path(), "holiday.jpg", b"b");

    let layout = DateLayout::new(dst.path())
        .with_oracle(DateSource::Filename.oracle())
        .with_granularity(DateGranularity::Day)
        .with_unknown_bucket("undated");
    let plan = plan::plan(&index(dst.path()), &index(src.path()), &layout);

    let targets: Vec<PathBuf> = plan.transfers().map(|(_, t)| t.to_path_buf()).collect();
    assert_eq!(
        targets,
        vec![
            dst.path().join("2023/05/14/IMG_20230514_101500.jpg"),
            dst.path().join("undated/holiday.jpg"),
        ]
    );
}

#[test]
fn test_name_clashes_get_suffixes() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let existing = write(dst.path(), "2020/01/IMG_0001.jpg", b"old");
    pin_local_noon(&existing, 2020, 1, 5);
    for (dir, content) in [("a", "one"), ("b", "two")] {
        let path = write(src.path(), &format!("{dir}/IMG_0001.jpg"), content.as_bytes());
        pin_local_noon(&path, 2020, 1, 20);
    }

    let layout = DateLayout::new(dst.path());
    let plan = plan::plan(&index(dst.path()), &index(src.path()), &layout);

    let targets: Vec<PathBuf> = plan.transfers().map(|(_, t)| t.to_path_buf()).collect();
    assert_eq!(
        targets,
        vec![
            dst.path().join("2020/01/IMG_0001_1.jpg"),
            dst.path().join("2020/01/IMG_0001_2.jpg"),
        ]
    );
}

#[test]
fn test_mirror_layout_and_determinism() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    write(src.path(), "trips/2019/rome.jpg", b"rome");
    write(src.path(), "trips/2019/rome_copy.jpg", b"rome");

    let source_index = index(src.path());
    let dest_index = index(dst.path());
    let layout = MirrorLayout::new(dst.path());
    let first = plan::plan(&dest_index, &source_index, &layout);
    let second = plan::plan(&dest_index, &source_index, &layout);

    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    match &first.actions()[0] {
        PlacementAction::Transfer { destination, .. } => {
            assert_eq!(*destination, dst.path().join("trips/2019/rome.jpg"));
        }
        other => panic!("expected transfer, got {other:?}"),
    }
}
