//! Reconciliation planning.
//!
//! [`plan`] compares the source index against the destination index and
//! produces a [`Plan`]: one [`PlacementAction`] per source fingerprint.
//! [`plan_around`] additionally steers targets away from names that are
//! already taken, such as files on disk the index does not represent. The
//! [`TransferExecutor`](crate::actions::TransferExecutor) applies the plan.

pub mod placement;
pub mod planner;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::index::FileRecord;
use crate::scanner::Fingerprint;

pub use placement::{
    ChainOracle, DateGranularity, DateLayout, DateOracle, DateSource, FilenameDateOracle, Layout,
    MirrorLayout, ModifiedTimeOracle, PlacementStrategy,
};
pub use planner::{exists_on_disk, plan, plan_around};

/// What to do with one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementAction {
    /// New content: place the file at `destination`.
    Transfer {
        /// The source file
        source: FileRecord,
        /// Target path under the destination root
        destination: PathBuf,
    },
    /// Content already present at the destination.
    Skip {
        /// The source file
        source: FileRecord,
        /// Destination file holding the same content
        existing: PathBuf,
    },
}

impl PlacementAction {
    /// Source record of this action.
    #[must_use]
    pub fn source(&self) -> &FileRecord {
        match self {
            Self::Transfer { source, .. } | Self::Skip { source, .. } => source,
        }
    }

    /// Fingerprint of the source content.
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.source().fingerprint
    }

    /// Whether this action places new content.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Transfer { .. })
    }
}

/// Ordered list of placement actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    actions: Vec<PlacementAction>,
}

/// Counts describing a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Files with new content
    pub new: usize,
    /// Files already present at the destination
    pub skip: usize,
    /// Bytes of new content
    pub new_bytes: u64,
}

impl Plan {
    /// Wrap `actions`, keeping their order.
    #[must_use]
    pub fn new(actions: Vec<PlacementAction>) -> Self {
        Self { actions }
    }

    /// All actions in order.
    #[must_use]
    pub fn actions(&self) -> &[PlacementAction] {
        &self.actions
    }

    /// Transfer actions as `(source, destination)` pairs.
    pub fn transfers(&self) -> impl Iterator<Item = (&FileRecord, &Path)> {
        self.actions.iter().filter_map(|a| match a {
            PlacementAction::Transfer {
                source,
                destination,
            } => Some((source, destination.as_path())),
            PlacementAction::Skip { .. } => None,
        })
    }

    /// Skip actions as `(source, existing)` pairs.
    pub fn skips(&self) -> impl Iterator<Item = (&FileRecord, &Path)> {
        self.actions.iter().filter_map(|a| match a {
            PlacementAction::Skip { source, existing } => Some((source, existing.as_path())),
            PlacementAction::Transfer { .. } => None,
        })
    }

    /// Number of transfer actions.
    #[must_use]
    pub fn new_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_transfer()).count()
    }

    /// Number of skip actions.
    #[must_use]
    pub fn skip_count(&self) -> usize {
        self.actions.len() - self.new_count()
    }

    /// Total number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Counts for reporting.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            match action {
                PlacementAction::Transfer { source, .. } => {
                    summary.new += 1;
                    summary.new_bytes += source.size;
                }
                PlacementAction::Skip { .. } => summary.skip += 1,
            }
        }
        summary
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a PlacementAction;
    type IntoIter = std::slice::Iter<'a, PlacementAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}
