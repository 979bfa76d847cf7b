//! photosync - content-addressed media sync
//!
//! Moves files from a loosely organized "duplicates" tree into a sorted
//! library, skipping every file whose content the library already holds.
//! Content identity is a file digest; digests are cached by
//! `(path, modification time)` so re-runs over large libraries only hash
//! what changed.

pub mod actions;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod output;
pub mod plan;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod sync;

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::{DuplicatePolicy, TransferConfig};
use crate::cache::FingerprintCache;
use crate::cli::{CacheCommand, Cli, Commands, ConfigCommand, IndexArgs, OutputFormat, SyncArgs};
use crate::config::{Config, ConfigOverrides};
use crate::error::ExitCode;
use crate::index::{DirectoryIndexer, IndexerConfig};
use crate::output::{text, JsonIndexOutput, JsonOutput};
use crate::progress::{LogProgress, Progress, ProgressCallback};
use crate::signal::ShutdownHandler;
use crate::sync::{SyncOptions, SyncPipeline, TreeReport};

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for invalid configuration or a failure that prevents
/// the command from running at all. Per-file failures are reported in the
/// summary and reflected in the returned [`ExitCode`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    match &cli.command {
        Commands::Sync(args) => run_sync(&cli, args),
        Commands::Index(args) => run_index(&cli, args),
        Commands::Cache { command } => run_cache(&cli, command),
        Commands::Config { command } => run_config(&cli, command),
    }
}

fn load_config(cli: &Cli, mut overrides: ConfigOverrides) -> Result<Config> {
    if cli.log_file.is_some() {
        overrides.log_file = cli.log_file.clone();
    }
    Config::load_with(cli.config.as_deref(), &overrides).context("failed to load configuration")
}

fn open_cache(config: &Config, disabled: bool, clear: bool) -> Result<FingerprintCache> {
    if disabled {
        log::debug!("Fingerprint cache disabled");
        return Ok(FingerprintCache::in_memory(config.algorithm));
    }
    let path = config.cache_path()?;
    let mut cache = FingerprintCache::load(&path, config.algorithm);
    if clear {
        log::info!("Clearing fingerprint cache {}", path.display());
        cache.clear();
    }
    Ok(cache)
}

fn progress_reporter(quiet: bool) -> Arc<dyn ProgressCallback> {
    if io::stderr().is_terminal() {
        Arc::new(Progress::new(quiet))
    } else {
        Arc::new(LogProgress)
    }
}

fn indexer_config(config: &Config, shutdown: &ShutdownHandler, quiet: bool) -> IndexerConfig {
    IndexerConfig::default()
        .with_walker_config(config.walker_config())
        .with_io_threads(config.io_threads)
        .with_checkpoint_every(config.checkpoint_every)
        .with_cadence(config.cadence())
        .with_shutdown_flag(shutdown.flag())
        .with_progress_callback(progress_reporter(quiet))
}

fn run_sync(cli: &Cli, args: &SyncArgs) -> Result<ExitCode> {
    let config = load_config(cli, args.overrides())?;
    logging::init_logging(cli.verbose, cli.quiet, config.log_file.as_deref());
    config.validate()?;

    if config.duplicates == DuplicatePolicy::Delete && !config.dry_run && !args.yes {
        anyhow::bail!("--duplicates delete removes files permanently; pass --yes to confirm");
    }

    let shutdown = signal::install_handler()?;
    let mut cache = open_cache(&config, args.scan.no_cache, args.clear_cache)?;

    let mut options = SyncOptions::new(&config.source, &config.destination);
    options.indexer = indexer_config(&config, &shutdown, cli.quiet);
    options.layout = config.layout;
    options.date_source = config.date_source;
    options.granularity = config.date_granularity;
    options.unknown_bucket = config.unknown_bucket.clone();
    options.transfer = TransferConfig::default()
        .with_mode(config.mode)
        .with_dry_run(config.dry_run)
        .with_duplicates(config.duplicates)
        .with_shutdown_flag(shutdown.flag());
    options.excluded_files.extend(config.log_file.clone());

    let pipeline = SyncPipeline::with_algorithm(options, config.algorithm);
    let (report, plan) = pipeline.run(&mut cache);
    let exit_code = ExitCode::for_outcome(report.interrupted, report.has_errors());

    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Text => text::write_sync(&mut stdout, &report)?,
        OutputFormat::Json => JsonOutput::new(&plan, &report, exit_code).write_to(&mut stdout, true)?,
    }
    stdout.flush()?;

    Ok(exit_code)
}

fn run_index(cli: &Cli, args: &IndexArgs) -> Result<ExitCode> {
    let config = load_config(cli, args.overrides())?;
    logging::init_logging(cli.verbose, cli.quiet, config.log_file.as_deref());

    let shutdown = signal::install_handler()?;
    let mut cache = open_cache(&config, args.scan.no_cache, false)?;

    let mut indexer_config = indexer_config(&config, &shutdown, cli.quiet);
    let mut excluded: Vec<PathBuf> = config.log_file.iter().cloned().collect();
    excluded.extend(cache.path().map(Path::to_path_buf));
    for path in &excluded {
        indexer_config.walker = indexer_config
            .walker
            .with_excluded_file(sync::resolve(path));
    }

    let root = sync::resolve(&args.path);
    let indexer = DirectoryIndexer::with_algorithm(indexer_config, config.algorithm);
    let (index, stats) = indexer.index("tree", &root, &mut cache);
    let summary = TreeReport::new(&index, &stats);
    let exit_code = ExitCode::for_outcome(stats.interrupted, !summary.errors.is_empty());

    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Text => {
            text::write_tree(&mut stdout, "Indexed", &summary)?;
            if args.list {
                for record in index.iter() {
                    writeln!(stdout, "{}  {}", record.fingerprint, record.relative.display())?;
                }
            }
        }
        OutputFormat::Json => {
            JsonIndexOutput::new(&index, &summary, args.list).write_to(&mut stdout, true)?;
        }
    }
    stdout.flush()?;

    Ok(exit_code)
}

fn run_cache(cli: &Cli, command: &CacheCommand) -> Result<ExitCode> {
    let (CacheCommand::Stats(args) | CacheCommand::Clear(args)) = command;
    let config = load_config(cli, args.overrides())?;
    logging::init_logging(cli.verbose, cli.quiet, config.log_file.as_deref());

    let path = config.cache_path()?;
    let mut cache = FingerprintCache::load(&path, config.algorithm);
    let mut stdout = io::stdout().lock();

    match command {
        CacheCommand::Stats(_) => {
            writeln!(stdout, "Cache file: {}", path.display())?;
            writeln!(stdout, "Algorithm: {}", cache.algorithm())?;
            writeln!(stdout, "Entries: {}", cache.len())?;
        }
        CacheCommand::Clear(_) => {
            let removed = cache.len();
            cache.clear();
            cache
                .persist()
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(stdout, "Removed {removed} cached fingerprints")?;
        }
    }
    Ok(ExitCode::Success)
}

fn run_config(cli: &Cli, command: &ConfigCommand) -> Result<ExitCode> {
    // `config init --config FILE` creates FILE, so a missing one is not an error there.
    let file = match command {
        ConfigCommand::Init { .. } => cli.config.as_deref().filter(|p| p.is_file()),
        ConfigCommand::Show => cli.config.as_deref(),
    };
    let config = Config::load_with(file, &ConfigOverrides::default())
        .context("failed to load configuration")?;
    let log_file = cli.log_file.as_deref().or(config.log_file.as_deref());
    logging::init_logging(cli.verbose, cli.quiet, log_file);

    match command {
        ConfigCommand::Init { force, path } => {
            let target = match path.clone().or_else(|| cli.config.clone()) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            if target.exists() && !force {
                anyhow::bail!(
                    "{} already exists; pass --force to overwrite",
                    target.display()
                );
            }
            config.save(&target)?;
            println!("Wrote {}", target.display());
        }
        ConfigCommand::Show => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(ExitCode::Success)
}
