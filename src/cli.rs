//! Command-line interface definitions for photosync.
//!
//! Flags left out fall through to the config file, `PHOTOSYNC_*`
//! environment variables and built-in defaults (see [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # Show what would move from /duplicates into /sorted (default dry run)
//! photosync sync
//!
//! # Copy new files into a mirrored layout for real
//! photosync sync ~/Import ~/Pictures --mode copy --layout mirror --apply
//!
//! # Fingerprint a tree and list its unique files as JSON
//! photosync index ~/Pictures --list --output json
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::actions::{DuplicatePolicy, TransferMode};
use crate::config::ConfigOverrides;
use crate::plan::{DateGranularity, DateSource, Layout};
use crate::scanner::HashAlgorithm;

/// Move net-new media files from a duplicates tree into a date-sorted library.
///
/// Files are matched by content fingerprint, so renamed copies of photos
/// already in the library are recognised and left alone.
#[derive(Debug, Parser)]
#[command(name = "photosync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE", env = "PHOTOSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also append log lines to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Transfer files missing from the destination
    Sync(SyncArgs),
    /// Fingerprint a single tree
    Index(IndexArgs),
    /// Inspect or reset the fingerprint cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Cache subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show the number of cached fingerprints
    Stats(CacheArgs),
    /// Delete every cached fingerprint
    Clear(CacheArgs),
}

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write the effective configuration to a TOML file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Target file (defaults to --config or the platform config path)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Print the effective configuration
    Show,
}

/// Options shared by every command that walks a tree.
#[derive(Debug, Default, Args)]
pub struct ScanOptions {
    /// Digest algorithm
    #[arg(long, value_enum)]
    pub algorithm: Option<HashAlgorithm>,

    /// Directory-name substrings to skip (can be specified multiple times)
    ///
    /// Replaces the configured list (default: @eaDir, tmp, cache).
    #[arg(short, long = "ignore", value_name = "NAME")]
    pub ignore: Vec<String>,

    /// Only index files with these extensions (can be specified multiple times)
    #[arg(short, long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Path to the fingerprint cache file
    ///
    /// If not specified, a default platform-specific path is used.
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Disable the fingerprint cache
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Number of I/O threads for hashing (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Report progress every N files
    #[arg(long, value_name = "N")]
    pub progress_interval: Option<usize>,

    /// Also report progress every N seconds
    #[arg(long, value_name = "SECS")]
    pub progress_seconds: Option<u64>,
}

impl ScanOptions {
    fn apply(&self, overrides: &mut ConfigOverrides) {
        overrides.algorithm = self.algorithm;
        if !self.ignore.is_empty() {
            overrides.ignore_dirs = Some(self.ignore.clone());
        }
        if !self.extensions.is_empty() {
            overrides.extensions = Some(self.extensions.clone());
        }
        if self.skip_hidden {
            overrides.skip_hidden = Some(true);
        }
        overrides.cache_file = self.cache.clone();
        overrides.io_threads = self.io_threads;
        overrides.progress_interval = self.progress_interval;
        overrides.progress_seconds = self.progress_seconds;
    }
}

/// Arguments for the sync subcommand.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Tree holding candidate files (default: /duplicates)
    #[arg(value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// Organized library (default: /sorted)
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<PathBuf>,

    #[command(flatten)]
    pub scan: ScanOptions,

    /// Move or copy new files
    #[arg(long, value_enum)]
    pub mode: Option<TransferMode>,

    /// Only log what would happen
    #[arg(long, conflicts_with = "apply")]
    pub dry_run: bool,

    /// Perform the transfers
    #[arg(long)]
    pub apply: bool,

    /// Destination layout for new files
    #[arg(long, value_enum)]
    pub layout: Option<Layout>,

    /// Where dates for the date layout come from
    #[arg(long, value_enum)]
    pub date_source: Option<DateSource>,

    /// Date bucket depth
    #[arg(long, value_enum)]
    pub granularity: Option<DateGranularity>,

    /// What to do with source files already in the library
    #[arg(long, value_enum)]
    pub duplicates: Option<DuplicatePolicy>,

    /// Confirm permanent deletion (required with --duplicates delete)
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Clear the fingerprint cache before scanning
    #[arg(long)]
    pub clear_cache: bool,

    /// Summary format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl SyncArgs {
    /// Config values given on the command line.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            source: self.source.clone(),
            destination: self.destination.clone(),
            mode: self.mode,
            layout: self.layout,
            date_source: self.date_source,
            date_granularity: self.granularity,
            duplicates: self.duplicates,
            ..ConfigOverrides::default()
        };
        if self.apply {
            overrides.dry_run = Some(false);
        } else if self.dry_run {
            overrides.dry_run = Some(true);
        }
        self.scan.apply(&mut overrides);
        overrides
    }
}

/// Arguments for the index subcommand.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Directory to fingerprint
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    #[command(flatten)]
    pub scan: ScanOptions,

    /// List each unique file with its fingerprint
    #[arg(long)]
    pub list: bool,

    /// Summary format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl IndexArgs {
    /// Config values given on the command line.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::default();
        self.scan.apply(&mut overrides);
        overrides
    }
}

/// Arguments for the cache subcommands.
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Path to the fingerprint cache file
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Digest algorithm the cache was built with
    #[arg(long, value_enum)]
    pub algorithm: Option<HashAlgorithm>,
}

impl CacheArgs {
    /// Config values given on the command line.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            cache_file: self.cache.clone(),
            algorithm: self.algorithm,
            ..ConfigOverrides::default()
        }
    }
}

/// Output format for run summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON output for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
