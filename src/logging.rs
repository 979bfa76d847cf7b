//! Logging infrastructure for photosync.
//!
//! This module provides logging through the `log` facade and the
//! `env_logger` backend. Log levels are determined by (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (error only) or `--verbose` (debug/trace)
//! 3. Default: info level
//!
//! Every line starts with a local `[YYYY-MM-DD HH:MM:SS]` timestamp. When a
//! log file is configured, lines go to stderr and are appended to the file,
//! with ANSI styling disabled.
//!
//! # Example
//!
//! ```rust,no_run
//! use photosync::logging::init_logging;
//! use std::path::Path;
//!
//! // Info level, stderr only
//! init_logging(0, false, None);
//!
//! // Debug level (-v), also appended to a log file
//! init_logging(1, false, Some(Path::new("/sorted/sync.log")));
//! ```

use env_logger::fmt::WriteStyle;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Initialize the logging subsystem.
///
/// Must be called once at startup, before any logging calls are made.
/// Later calls are ignored.
///
/// # Arguments
///
/// * `verbose` - Verbosity count from CLI (0=normal, 1=debug, 2+=trace)
/// * `quiet` - If true, only show errors (overridden by RUST_LOG)
/// * `log_file` - Optional file receiving a copy of every line
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) {
    let use_env = env::var("RUST_LOG").is_ok();
    let mut builder = Builder::new();

    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    configure_format(&mut builder, verbose);

    let mut file_error = None;
    if let Some(path) = log_file {
        match open_log_file(path) {
            Ok(file) => {
                builder.write_style(WriteStyle::Never);
                builder.target(Target::Pipe(Box::new(TeeWriter::new(io::stderr(), file))));
            }
            Err(e) => file_error = Some(e),
        }
    }

    if builder.try_init().is_err() {
        return;
    }

    if let (Some(path), Some(e)) = (log_file, file_error) {
        log::warn!(
            "Cannot open log file {}: {}; logging to stderr only",
            path.display(),
            e
        );
    }
    log::debug!(
        "Logging initialized at level: {}",
        if use_env {
            "RUST_LOG"
        } else {
            current_level_name()
        }
    );
}

/// Determine the log level from CLI flags.
///
/// Quiet wins over verbose.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    builder.format(move |buf, record| {
        let timestamp = chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]");
        let level = record.level();
        let level_style = buf.default_level_style(level);

        if verbose >= 1 {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} {}",
                timestamp,
                level,
                record.args()
            )
        }
    });
}

/// Open `path` for appending, creating parent directories.
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writes every buffer to both sinks.
struct TeeWriter<A, B> {
    primary: A,
    secondary: B,
}

impl<A: Write, B: Write> TeeWriter<A, B> {
    fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        self.secondary.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }
}

/// Get the current log level as a string.
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
