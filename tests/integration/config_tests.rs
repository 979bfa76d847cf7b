use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use photosync::actions::{DuplicatePolicy, TransferMode};
use photosync::config::{Config, ConfigError, ConfigOverrides};
use photosync::plan::{DateGranularity, Layout};
use photosync::scanner::HashAlgorithm;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

// Environment variables are process-wide.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_config_load_defaults() {
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.source, PathBuf::from("/duplicates"));
    assert_eq!(config.destination, PathBuf::from("/sorted"));
    assert_eq!(config.algorithm, HashAlgorithm::Md5);
    assert_eq!(config.mode, TransferMode::Move);
    assert_eq!(config.layout, Layout::Date);
    assert_eq!(config.duplicates, DuplicatePolicy::Keep);
    assert_eq!(config.progress_interval, 10_000);
    assert_eq!(config.checkpoint_every, 5000);
    assert!(config.log_file.is_none());
}

#[test]
fn test_config_load_from_env() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var("PHOTOSYNC_IO_THREADS", "16");
    std::env::set_var("PHOTOSYNC_ALGORITHM", "blake3");
    std::env::set_var("PHOTOSYNC_IGNORE_DIRS", "@eaDir,#recycle");
    std::env::set_var("PHOTOSYNC_DRY_RUN", "false");

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("PHOTOSYNC_"));
    let config: Result<Config, _> = figment.extract();

    std::env::remove_var("PHOTOSYNC_IO_THREADS");
    std::env::remove_var("PHOTOSYNC_ALGORITHM");
    std::env::remove_var("PHOTOSYNC_IGNORE_DIRS");
    std::env::remove_var("PHOTOSYNC_DRY_RUN");

    let config = config.unwrap();
    assert_eq!(config.io_threads, 16);
    assert_eq!(config.algorithm, HashAlgorithm::Blake3);
    assert_eq!(config.ignore_dirs, vec!["@eaDir", "#recycle"]);
    assert!(!config.dry_run);
}

#[test]
fn test_layer_precedence() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
date_granularity = "day"
io_threads = 8
mode = "copy"
"#,
    )
    .unwrap();

    std::env::set_var("PHOTOSYNC_IO_THREADS", "6");
    let overrides = ConfigOverrides {
        mode: Some(TransferMode::Move),
        ..ConfigOverrides::default()
    };
    let config = Config::load_with(Some(&path), &overrides);
    std::env::remove_var("PHOTOSYNC_IO_THREADS");

    let config = config.unwrap();
    assert_eq!(config.date_granularity, DateGranularity::Day);
    assert_eq!(config.io_threads, 6);
    assert_eq!(config.mode, TransferMode::Move);
}

#[test]
fn test_invalid_value_is_a_load_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "mode = \"teleport\"\n").unwrap();

    let result: Result<Config, _> = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .extract();
    assert!(result.is_err());

    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    assert!(matches!(
        Config::load(Some(&path)),
        Err(ConfigError::Load(_))
    ));
}

#[test]
fn test_save_writes_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("photosync/config.toml");
    let config = Config {
        layout: Layout::Mirror,
        log_file: Some(PathBuf::from("/var/log/photosync.log")),
        ..Config::default()
    };
    config.save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("layout = \"mirror\""));
    assert!(text.contains("log_file = \"/var/log/photosync.log\""));
    assert!(!text.contains("cache_file"));
}
