//! Transfer executor.
//!
//! # Overview
//!
//! Applies a [`Plan`] to the filesystem:
//! - `Transfer` actions move or copy the source file to its target
//! - `Skip` actions keep, trash or delete the redundant source copy,
//!   depending on the [`DuplicatePolicy`]
//!
//! # Safety
//!
//! - An existing destination file is never overwritten
//! - Every action re-checks the source against the indexed size and mtime
//!   (TOCTOU protection)
//! - A duplicate is only removed while its destination counterpart exists
//! - Dry runs only log; nothing on disk changes

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use filetime::FileTime;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::index::FileRecord;
use crate::plan::{PlacementAction, Plan};

/// How new files reach the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Relocate the file
    #[default]
    Move,
    /// Leave the source in place
    Copy,
}

impl TransferMode {
    /// Lowercase verb used in log lines.
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Copy => "copy",
        }
    }
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

/// What happens to source files whose content already exists at the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Leave them alone
    #[default]
    Keep,
    /// Move them to the system trash
    Trash,
    /// Delete them permanently
    Delete,
}

/// Error type for transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Source vanished after indexing.
    #[error("source file missing: {0}")]
    SourceMissing(PathBuf),

    /// Source changed after indexing.
    #[error("source file modified since indexing: {0}")]
    SourceModified(PathBuf),

    /// Something already occupies the target path.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// The destination copy a duplicate was matched against is gone.
    #[error("duplicate {duplicate} not removed: counterpart {existing} is missing")]
    CounterpartMissing {
        /// Duplicate that would have been removed
        duplicate: PathBuf,
        /// Destination file it duplicates
        existing: PathBuf,
    },

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that could not be trashed
        path: PathBuf,
        /// Message reported by the trash backend
        message: String,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    /// Path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::SourceMissing(p)
            | Self::SourceModified(p)
            | Self::DestinationExists(p)
            | Self::PermissionDenied(p)
            | Self::CounterpartMissing { duplicate: p, .. }
            | Self::TrashFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    fn from_io(path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => Self::DestinationExists(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

/// Result of one applied action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// File moved or copied.
    Transferred {
        /// Mode used
        mode: TransferMode,
        /// Source path
        source: PathBuf,
        /// Final path
        destination: PathBuf,
        /// Bytes placed
        bytes: u64,
    },
    /// Dry run: the transfer would have happened.
    WouldTransfer {
        /// Mode that would be used
        mode: TransferMode,
        /// Source path
        source: PathBuf,
        /// Target path
        destination: PathBuf,
    },
    /// Duplicate left in place.
    DuplicateKept {
        /// Redundant source copy
        source: PathBuf,
    },
    /// Duplicate trashed or deleted.
    DuplicateRemoved {
        /// Removed path
        source: PathBuf,
        /// Whether removal bypassed the trash
        permanent: bool,
        /// Bytes freed
        bytes: u64,
    },
    /// Dry run: the duplicate would have been removed.
    WouldRemoveDuplicate {
        /// Redundant source copy
        source: PathBuf,
        /// Policy that would be applied
        policy: DuplicatePolicy,
    },
}

/// One failed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferFailure {
    /// Source path of the action
    pub path: PathBuf,
    /// Error message
    pub error: String,
}

/// Results of applying a whole plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    /// Files moved or copied
    pub transferred: usize,
    /// Bytes moved or copied
    pub bytes_transferred: u64,
    /// Dry run: transfers that would have happened
    pub would_transfer: usize,
    /// Duplicates left in place (including dry-run removals)
    pub duplicates_kept: usize,
    /// Duplicates trashed or deleted
    pub duplicates_removed: usize,
    /// Bytes freed by removing duplicates
    pub bytes_freed: u64,
    /// Failed actions
    pub failures: Vec<TransferFailure>,
    /// Whether execution stopped early on a shutdown request
    pub interrupted: bool,
}

impl TransferReport {
    /// Number of failed actions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if all actions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Transferred { bytes, .. } => {
                self.transferred += 1;
                self.bytes_transferred += bytes;
            }
            TransferOutcome::WouldTransfer { .. } => self.would_transfer += 1,
            TransferOutcome::DuplicateKept { .. } | TransferOutcome::WouldRemoveDuplicate { .. } => {
                self.duplicates_kept += 1;
            }
            TransferOutcome::DuplicateRemoved { bytes, .. } => {
                self.duplicates_removed += 1;
                self.bytes_freed += bytes;
            }
        }
    }
}

/// Configuration for the transfer executor.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Move or copy.
    pub mode: TransferMode,
    /// Log actions without performing them.
    pub dry_run: bool,
    /// What to do with duplicates.
    pub duplicates: DuplicatePolicy,
    /// Re-check sources against the indexed size and mtime.
    pub verify_source: bool,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            mode: TransferMode::Move,
            dry_run: true,
            duplicates: DuplicatePolicy::Keep,
            verify_source: true,
            shutdown_flag: None,
        }
    }
}

impl TransferConfig {
    /// Set the transfer mode.
    #[must_use]
    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable/disable dry run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the duplicate policy.
    #[must_use]
    pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Enable/disable TOCTOU verification.
    #[must_use]
    pub fn with_verify_source(mut self, verify: bool) -> Self {
        self.verify_source = verify;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }
}

/// Applies placement actions.
#[derive(Debug, Clone, Default)]
pub struct TransferExecutor {
    config: TransferConfig,
}

impl TransferExecutor {
    /// Create an executor.
    #[must_use]
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Apply every action of `plan` in order, logging each result.
    ///
    /// Failures are recorded and execution continues with the next action.
    pub fn apply_all(&self, plan: &Plan) -> TransferReport {
        let mut report = TransferReport::default();

        for action in plan {
            if self.is_shutdown_requested() {
                log::info!("Transfers interrupted by shutdown signal");
                report.interrupted = true;
                break;
            }

            match self.apply(action) {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    let source = &action.source().path;
                    match action {
                        PlacementAction::Transfer { .. } => log::error!(
                            "Failed to {} {}: {}",
                            self.config.mode,
                            source.display(),
                            e
                        ),
                        PlacementAction::Skip { .. } => log::error!(
                            "Failed to remove duplicate {}: {}",
                            source.display(),
                            e
                        ),
                    }
                    report.failures.push(TransferFailure {
                        path: source.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Apply one action.
    ///
    /// # Errors
    ///
    /// - `SourceMissing` / `SourceModified` if the source no longer matches
    ///   its index record
    /// - `DestinationExists` if the target path is occupied
    /// - `CounterpartMissing` if a duplicate's destination copy is gone
    /// - I/O, permission and trash errors from the operation itself
    pub fn apply(&self, action: &PlacementAction) -> Result<TransferOutcome, TransferError> {
        match action {
            PlacementAction::Transfer {
                source,
                destination,
            } => self.transfer(source, destination),
            PlacementAction::Skip { source, existing } => self.handle_duplicate(source, existing),
        }
    }

    fn transfer(
        &self,
        record: &FileRecord,
        destination: &Path,
    ) -> Result<TransferOutcome, TransferError> {
        let mode = self.config.mode;
        self.verify(record)?;
        if fs::symlink_metadata(destination).is_ok() {
            return Err(TransferError::DestinationExists(destination.to_path_buf()));
        }

        if self.config.dry_run {
            log::info!(
                "[DRY_RUN] Would {}: {} -> {}",
                mode,
                record.path.display(),
                destination.display()
            );
            return Ok(TransferOutcome::WouldTransfer {
                mode,
                source: record.path.clone(),
                destination: destination.to_path_buf(),
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| TransferError::from_io(parent, e))?;
        }

        match mode {
            TransferMode::Move => move_noclobber(&record.path, destination)?,
            TransferMode::Copy => copy_noclobber(&record.path, destination)?,
        }

        log::info!(
            "[OK] {}: {} -> {}",
            mode.verb().to_uppercase(),
            record.path.display(),
            destination.display()
        );
        Ok(TransferOutcome::Transferred {
            mode,
            source: record.path.clone(),
            destination: destination.to_path_buf(),
            bytes: record.size,
        })
    }

    fn handle_duplicate(
        &self,
        record: &FileRecord,
        existing: &Path,
    ) -> Result<TransferOutcome, TransferError> {
        let policy = self.config.duplicates;
        if policy == DuplicatePolicy::Keep {
            log::debug!(
                "[SKIP] {} already present as {}",
                record.path.display(),
                existing.display()
            );
            return Ok(TransferOutcome::DuplicateKept {
                source: record.path.clone(),
            });
        }

        self.verify(record)?;
        match fs::metadata(existing) {
            Ok(m) if m.is_file() => {}
            _ => {
                return Err(TransferError::CounterpartMissing {
                    duplicate: record.path.clone(),
                    existing: existing.to_path_buf(),
                })
            }
        }

        let permanent = policy == DuplicatePolicy::Delete;
        let verb = if permanent { "delete" } else { "trash" };

        if self.config.dry_run {
            log::info!(
                "[DRY_RUN] Would {} duplicate: {} (same as {})",
                verb,
                record.path.display(),
                existing.display()
            );
            return Ok(TransferOutcome::WouldRemoveDuplicate {
                source: record.path.clone(),
                policy,
            });
        }

        if permanent {
            fs::remove_file(&record.path).map_err(|e| TransferError::from_io(&record.path, e))?;
        } else {
            trash::delete(&record.path).map_err(|e| TransferError::TrashFailed {
                path: record.path.clone(),
                message: e.to_string(),
            })?;
        }

        log::info!(
            "[OK] {}: {} (same as {})",
            verb.to_uppercase(),
            record.path.display(),
            existing.display()
        );
        Ok(TransferOutcome::DuplicateRemoved {
            source: record.path.clone(),
            permanent,
            bytes: record.size,
        })
    }

    /// Check the source still matches its index record.
    fn verify(&self, record: &FileRecord) -> Result<(), TransferError> {
        let metadata = match fs::symlink_metadata(&record.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TransferError::SourceMissing(record.path.clone()))
            }
            Err(e) => return Err(TransferError::from_io(&record.path, e)),
        };

        if !self.config.verify_source {
            return Ok(());
        }

        let modified = metadata.modified().ok();
        if !metadata.is_file() || metadata.len() != record.size || modified != Some(record.modified)
        {
            log::warn!(
                "File modified since indexing: {} (size {} -> {})",
                record.path.display(),
                record.size,
                metadata.len()
            );
            return Err(TransferError::SourceModified(record.path.clone()));
        }
        Ok(())
    }

    fn is_shutdown_requested(&self) -> bool {
        self.config
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Move `source` to `destination` without replacing an existing file.
///
/// Links the new name first and unlinks the old one afterwards; when hard
/// links are unavailable (other filesystem, unsupported) the content is
/// copied and the source removed.
fn move_noclobber(source: &Path, destination: &Path) -> Result<(), TransferError> {
    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(TransferError::DestinationExists(destination.to_path_buf()))
        }
        Err(e) => {
            log::debug!(
                "Hard link {} -> {} failed ({}), copying instead",
                source.display(),
                destination.display(),
                e
            );
            copy_noclobber(source, destination)?;
        }
    }

    fs::remove_file(source).map_err(|e| TransferError::from_io(source, e))
}

/// Copy `source` to `destination` preserving permissions and timestamps.
///
/// Content lands in a temporary file next to the target which is then
/// persisted without clobbering, so a crash never leaves a partial file
/// under the final name.
fn copy_noclobber(source: &Path, destination: &Path) -> Result<(), TransferError> {
    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut input = File::open(source).map_err(|e| TransferError::from_io(source, e))?;
    let metadata = input
        .metadata()
        .map_err(|e| TransferError::from_io(source, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| TransferError::from_io(parent, e))?;
    io::copy(&mut input, tmp.as_file_mut()).map_err(|e| TransferError::from_io(destination, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| TransferError::from_io(destination, e))?;

    fs::set_permissions(tmp.path(), metadata.permissions())
        .map_err(|e| TransferError::from_io(destination, e))?;
    filetime::set_file_times(
        tmp.path(),
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
    .map_err(|e| TransferError::from_io(destination, e))?;

    tmp.persist_noclobber(destination)
        .map_err(|e| TransferError::from_io(destination, e.error))?;
    Ok(())
}
