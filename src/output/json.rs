//! JSON output for sync and index runs.
//!
//! # Sync schema
//!
//! ```json
//! {
//!   "actions": [
//!     { "action": "transfer", "fingerprint": "5eb6...", "source": "/duplicates/a.jpg",
//!       "destination": "/sorted/2021/03/a.jpg", "size": 1024 },
//!     { "action": "skip", "fingerprint": "d41d...", "source": "/duplicates/b.jpg",
//!       "destination": "/sorted/2020/01/b.jpg", "size": 0 }
//!   ],
//!   "summary": {
//!     "destination": { "root": "/sorted", "scanned": 10, ... },
//!     "source": { "root": "/duplicates", "scanned": 2, ... },
//!     "plan": { "new": 1, "skip": 1, "new_bytes": 1024 },
//!     "transfer": { "transferred": 0, "would_transfer": 1, ... },
//!     "dry_run": true,
//!     "interrupted": false,
//!     "elapsed_secs": 0.4,
//!     "exit_code": 0,
//!     "exit_code_name": "PS000"
//!   }
//! }
//! ```

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ExitCode;
use crate::index::FingerprintIndex;
use crate::plan::{PlacementAction, Plan};
use crate::sync::{SyncReport, TreeReport};

/// One plan entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonAction {
    /// `"transfer"` or `"skip"`
    pub action: &'static str,
    /// Content fingerprint (lowercase hex)
    pub fingerprint: String,
    /// Source file
    pub source: PathBuf,
    /// Target path (transfer) or existing copy (skip)
    pub destination: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl JsonAction {
    /// Convert a plan action.
    #[must_use]
    pub fn from_action(action: &PlacementAction) -> Self {
        let (kind, destination) = match action {
            PlacementAction::Transfer { destination, .. } => ("transfer", destination),
            PlacementAction::Skip { existing, .. } => ("skip", existing),
        };
        let source = action.source();
        Self {
            action: kind,
            fingerprint: source.fingerprint.to_string(),
            source: source.path.clone(),
            destination: destination.clone(),
            size: source.size,
        }
    }
}

/// Sync report plus exit code.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary<'a> {
    /// The run report
    #[serde(flatten)]
    pub report: &'a SyncReport,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "PS000")
    pub exit_code_name: &'static str,
}

/// Complete JSON document for a sync run.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    /// Plan entries in order
    pub actions: Vec<JsonAction>,
    /// Run summary
    pub summary: JsonSummary<'a>,
}

impl<'a> JsonOutput<'a> {
    /// Build the document for a finished sync.
    #[must_use]
    pub fn new(plan: &Plan, report: &'a SyncReport, exit_code: ExitCode) -> Self {
        Self {
            actions: plan.actions().iter().map(JsonAction::from_action).collect(),
            summary: JsonSummary {
                report,
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix(),
            },
        }
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// One index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonIndexEntry {
    /// Content fingerprint
    pub fingerprint: String,
    /// Path relative to the indexed root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// JSON document for an index run.
#[derive(Debug, Clone, Serialize)]
pub struct JsonIndexOutput<'a> {
    /// Tree summary
    pub summary: &'a TreeReport,
    /// Representative files, when listing was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<JsonIndexEntry>>,
}

impl<'a> JsonIndexOutput<'a> {
    /// Build the document; entries are included only when `list` is set.
    #[must_use]
    pub fn new(index: &FingerprintIndex, summary: &'a TreeReport, list: bool) -> Self {
        let entries = list.then(|| {
            index
                .iter()
                .map(|r| JsonIndexEntry {
                    fingerprint: r.fingerprint.to_string(),
                    path: r.relative.clone(),
                    size: r.size,
                })
                .collect()
        });
        Self { summary, entries }
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

fn write_json<T: Serialize, W: Write>(
    value: &T,
    writer: &mut W,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
