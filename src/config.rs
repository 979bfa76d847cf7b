//! Layered application configuration.
//!
//! Values are resolved with `figment`, later layers winning:
//!
//! 1. built-in defaults ([`Config::default`])
//! 2. the TOML config file (`--config`, else the platform config dir)
//! 3. `PHOTOSYNC_*` environment variables
//! 4. command-line flags ([`ConfigOverrides`])
//!
//! ```toml
//! source = "/duplicates"
//! destination = "/sorted"
//! algorithm = "md5"
//! mode = "move"
//! dry_run = true
//! layout = "date"
//! ignore_dirs = ["@eaDir", "tmp", "cache"]
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

use crate::actions::{DuplicatePolicy, TransferMode};
use crate::plan::{DateGranularity, DateSource, Layout};
use crate::progress::ProgressCadence;
use crate::scanner::{HashAlgorithm, IgnoreList, WalkerConfig};
use crate::sync;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "PHOTOSYNC_";

/// Errors raised while loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or has the wrong shape.
    #[error("invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Source and destination are the same directory.
    #[error("source and destination are the same directory: {0}")]
    SameTree(PathBuf),

    /// One tree lives inside the other.
    #[error("{inner} is inside {outer}; source and destination must be disjoint")]
    NestedTrees {
        /// Enclosing tree
        outer: PathBuf,
        /// Enclosed tree
        inner: PathBuf,
    },

    /// A key holds an unusable value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Config key
        key: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// Reading or writing the config file failed.
    #[error("config I/O error for {path}: {source}")]
    Io {
        /// Config file involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config could not be encoded as TOML.
    #[error("failed to encode config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The platform has no home directory to derive default paths from.
    #[error("could not determine platform config and cache directories")]
    NoProjectDirs,
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tree holding candidate files.
    pub source: PathBuf,
    /// Organized library.
    pub destination: PathBuf,
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Move or copy new files.
    pub mode: TransferMode,
    /// Log actions without touching the filesystem.
    pub dry_run: bool,
    /// Destination layout.
    pub layout: Layout,
    /// Where the date layout takes dates from.
    pub date_source: DateSource,
    /// Date bucket depth.
    pub date_granularity: DateGranularity,
    /// Bucket for files without a usable date.
    pub unknown_bucket: String,
    /// Directory-name substrings pruned from traversal.
    #[serde(deserialize_with = "string_list")]
    pub ignore_dirs: Vec<String>,
    /// Extension allowlist; `None` keeps every file.
    #[serde(
        deserialize_with = "optional_string_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub extensions: Option<Vec<String>>,
    /// Prune dot-files and dot-directories.
    pub skip_hidden: bool,
    /// Report progress every N files.
    pub progress_interval: usize,
    /// Also report progress every N seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_seconds: Option<u64>,
    /// Fingerprint cache file; the platform cache dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    /// Append-only log file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// What to do with source files already in the library.
    pub duplicates: DuplicatePolicy,
    /// Hashing threads.
    pub io_threads: usize,
    /// Persist the cache every N new fingerprints (0 disables).
    pub checkpoint_every: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::from("/duplicates"),
            destination: PathBuf::from("/sorted"),
            algorithm: HashAlgorithm::Md5,
            mode: TransferMode::Move,
            dry_run: true,
            layout: Layout::Date,
            date_source: DateSource::Modified,
            date_granularity: DateGranularity::Month,
            unknown_bucket: "unknown".to_string(),
            ignore_dirs: vec!["@eaDir".to_string(), "tmp".to_string(), "cache".to_string()],
            extensions: None,
            skip_hidden: false,
            progress_interval: 10_000,
            progress_seconds: None,
            cache_file: None,
            log_file: None,
            duplicates: DuplicatePolicy::Keep,
            io_threads: 4,
            checkpoint_every: 5000,
        }
    }
}

/// Values supplied on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<HashAlgorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<TransferMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_source: Option<DateSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_granularity: Option<DateGranularity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_dirs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_interval: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<DuplicatePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_threads: Option<usize>,
}

impl Config {
    /// Figment with defaults, the TOML file and the environment layered.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load defaults, file and environment.
    ///
    /// # Errors
    ///
    /// See [`Config::load_with`].
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(file, &ConfigOverrides::default())
    }

    /// Load all layers with `overrides` on top.
    ///
    /// An explicit `file` must exist; without one the platform default is
    /// used when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] for a missing explicit file and
    /// [`ConfigError::Load`] when a layer does not parse.
    pub fn load_with(
        file: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let file = match file {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().ok().filter(|p| p.is_file()),
        };
        if let Some(path) = &file {
            log::debug!("Loading config from {}", path.display());
        }

        let config: Self = Self::figment(file.as_deref())
            .merge(Serialized::defaults(overrides))
            .extract()?;
        Ok(config)
    }

    /// Platform config file (`config.toml`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] without a home directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Platform fingerprint cache file (`hash_cache.json`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] without a home directory.
    pub fn default_cache_file() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.cache_dir().join("hash_cache.json"))
    }

    /// Configured cache file, else the platform default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] when neither is available.
    pub fn cache_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.cache_file {
            Some(path) => Ok(path.clone()),
            None => Self::default_cache_file(),
        }
    }

    /// Traversal filters.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        let config = WalkerConfig {
            ignore: IgnoreList::new(&self.ignore_dirs),
            skip_hidden: self.skip_hidden,
            ..WalkerConfig::default()
        };
        match &self.extensions {
            Some(extensions) => config.with_extensions(extensions),
            None => config,
        }
    }

    /// Progress cadence.
    #[must_use]
    pub fn cadence(&self) -> ProgressCadence {
        ProgressCadence {
            every_files: Some(self.progress_interval.max(1)),
            every: self.progress_seconds.map(Duration::from_secs),
        }
    }

    /// Reject configurations that must not reach a scan.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let source = sync::resolve(&self.source);
        let destination = sync::resolve(&self.destination);
        if source == destination {
            return Err(ConfigError::SameTree(source));
        }
        if source.starts_with(&destination) {
            return Err(ConfigError::NestedTrees {
                outer: destination,
                inner: source,
            });
        }
        if destination.starts_with(&source) {
            return Err(ConfigError::NestedTrees {
                outer: source,
                inner: destination,
            });
        }

        if self.io_threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "io_threads",
                message: "must be at least 1".to_string(),
            });
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "progress_interval",
                message: "must be at least 1".to_string(),
            });
        }

        let mut components = Path::new(&self.unknown_bucket).components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single {
            return Err(ConfigError::InvalidValue {
                key: "unknown_bucket",
                message: format!(
                    "{:?} must be a single directory name",
                    self.unknown_bucket
                ),
            });
        }
        Ok(())
    }

    /// Write the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("org", "photosync", "photosync").ok_or(ConfigError::NoProjectDirs)
}

/// A list given either as an array or as one comma-separated string
/// (the form environment variables take).
#[derive(Deserialize)]
#[serde(untagged)]
enum StringList {
    List(Vec<String>),
    Text(String),
}

impl From<StringList> for Vec<String> {
    fn from(value: StringList) -> Self {
        match value {
            StringList::List(items) => items,
            StringList::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    StringList::deserialize(deserializer).map(Into::into)
}

fn optional_string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringList>::deserialize(deserializer).map(|list| list.map(Into::into))
}
