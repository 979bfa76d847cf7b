//! Progress reporting for long indexing runs.
//!
//! Progress is an observer: the indexer owns a [`ProgressTicker`] that
//! decides when a cadence boundary has been crossed and then hands a
//! [`ProgressUpdate`] snapshot to a [`ProgressCallback`]. Reporting never
//! feeds back into traversal order or results.
//!
//! Two reporters are provided:
//! - [`Progress`]: an indicatif spinner for interactive terminals
//! - [`LogProgress`]: periodic `N scanned (R f/s)` info lines

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Snapshot of indexing progress.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressUpdate {
    /// Regular files visited so far
    pub scanned: usize,
    /// Files digested (cache misses)
    pub hashed: usize,
    /// Files served from the fingerprint cache
    pub cache_hits: usize,
    /// Files skipped because of errors
    pub errors: usize,
    /// Time since the phase started
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Files per second since the phase started.
    #[must_use]
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.scanned as f64 / secs
        } else {
            0.0
        }
    }

    /// `N scanned (R f/s)`; the level column supplies the severity.
    #[must_use]
    pub fn status_line(&self) -> String {
        format!("{} scanned ({:.1} f/s)", self.scanned, self.rate())
    }
}

/// Receives progress notifications.
///
/// Implement this trait to observe an indexing run.
pub trait ProgressCallback: Send + Sync {
    /// Called when indexing of a tree starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the tree ("destination", "source", ...)
    /// * `root` - Root directory being indexed
    fn on_phase_start(&self, phase: &str, root: &Path);

    /// Called each time a cadence boundary is crossed.
    fn on_progress(&self, update: &ProgressUpdate);

    /// Called once the tree has been fully indexed.
    fn on_phase_end(&self, phase: &str, update: &ProgressUpdate);
}

/// When to emit progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressCadence {
    /// Report every N scanned files.
    pub every_files: Option<usize>,
    /// Report when this much wall-clock time passed since the last report.
    pub every: Option<Duration>,
}

impl Default for ProgressCadence {
    fn default() -> Self {
        Self {
            every_files: Some(10_000),
            every: None,
        }
    }
}

impl ProgressCadence {
    /// Report every `n` files only.
    #[must_use]
    pub fn files(n: usize) -> Self {
        Self {
            every_files: Some(n.max(1)),
            every: None,
        }
    }

    /// Never report intermediate progress.
    #[must_use]
    pub fn never() -> Self {
        Self {
            every_files: None,
            every: None,
        }
    }
}

/// Tracks cadence boundaries for one phase.
#[derive(Debug)]
pub struct ProgressTicker {
    cadence: ProgressCadence,
    started: Instant,
    last_report: Instant,
    next_file_mark: Option<usize>,
}

impl ProgressTicker {
    /// Start a ticker at `now`.
    #[must_use]
    pub fn new(cadence: ProgressCadence, now: Instant) -> Self {
        Self {
            cadence,
            started: now,
            last_report: now,
            next_file_mark: cadence.every_files.map(|n| n.max(1)),
        }
    }

    /// Time since the ticker started.
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Whether a report is due after `scanned` files at time `now`.
    pub fn should_report(&mut self, scanned: usize, now: Instant) -> bool {
        let mut due = false;

        if let (Some(mark), Some(step)) = (self.next_file_mark, self.cadence.every_files) {
            if scanned >= mark {
                due = true;
                let step = step.max(1);
                self.next_file_mark = Some((scanned / step + 1) * step);
            }
        }

        if let Some(interval) = self.cadence.every {
            if now.saturating_duration_since(self.last_report) >= interval {
                due = true;
            }
        }

        if due {
            self.last_report = now;
        }
        due
    }
}

/// Logs progress lines through the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_phase_start(&self, phase: &str, root: &Path) {
        log::info!("Indexing {} tree: {}", phase, root.display());
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        log::info!("{}", update.status_line());
    }

    fn on_phase_end(&self, phase: &str, update: &ProgressUpdate) {
        log::debug!(
            "Finished {} tree: {} scanned, {} hashed, {} cached, {} errors",
            phase,
            update.scanned,
            update.hashed,
            update.cache_hits,
            update.errors
        );
    }
}

/// Terminal spinner using indicatif.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is displayed.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, _root: &Path) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(Self::style());
        pb.set_message(format!("Indexing {phase}"));
        pb.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(pb);
        }
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        if self.quiet {
            return;
        }

        if let Ok(bar) = self.bar.lock() {
            if let Some(pb) = bar.as_ref() {
                pb.set_position(update.scanned as u64);
            }
        }
    }

    fn on_phase_end(&self, phase: &str, update: &ProgressUpdate) {
        if self.quiet {
            return;
        }

        if let Ok(mut bar) = self.bar.lock() {
            if let Some(pb) = bar.take() {
                pb.set_position(update.scanned as u64);
                pb.finish_with_message(format!("Indexed {phase}"));
            }
        }
    }
}
