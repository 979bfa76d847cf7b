//! Reconciliation between the destination and source indexes.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::placement::PlacementStrategy;
use super::{PlacementAction, Plan};
use crate::index::FingerprintIndex;

/// Compare `source` against `destination` and emit one action per source
/// fingerprint, in source traversal order.
///
/// A fingerprint absent from `destination` becomes a
/// [`PlacementAction::Transfer`] targeted by `strategy`; a fingerprint
/// already present becomes a [`PlacementAction::Skip`] naming the existing
/// copy. Pure: the filesystem is never touched, so planning twice against
/// the same indexes yields the same plan.
///
/// Targets are kept unique within the plan and distinct from the paths of
/// destination representatives; a clash gets a `_1`, `_2`, ... suffix on
/// the file stem.
#[must_use]
pub fn plan(
    destination: &FingerprintIndex,
    source: &FingerprintIndex,
    strategy: &dyn PlacementStrategy,
) -> Plan {
    plan_around(destination, source, strategy, |_| false)
}

/// Like [`plan`], but also steers targets away from every path for which
/// `occupied` returns true.
///
/// The destination index only holds one representative per fingerprint;
/// shadowed copies, filtered files and hidden entries still occupy their
/// names. Pass [`exists_on_disk`] to treat those as taken too.
#[must_use]
pub fn plan_around(
    destination: &FingerprintIndex,
    source: &FingerprintIndex,
    strategy: &dyn PlacementStrategy,
    occupied: impl Fn(&Path) -> bool,
) -> Plan {
    let mut claimed: HashSet<PathBuf> = destination.iter().map(|r| r.path.clone()).collect();
    let is_taken = |path: &Path, claimed: &HashSet<PathBuf>| claimed.contains(path) || occupied(path);
    let mut actions = Vec::with_capacity(source.len());

    for record in source.iter() {
        match destination.get(&record.fingerprint) {
            Some(existing) => actions.push(PlacementAction::Skip {
                source: record.clone(),
                existing: existing.path.clone(),
            }),
            None => {
                let target = unclaimed(strategy.target(record), |p| is_taken(p, &claimed));
                claimed.insert(target.clone());
                actions.push(PlacementAction::Transfer {
                    source: record.clone(),
                    destination: target,
                });
            }
        }
    }

    let plan = Plan::new(actions);
    log::info!(
        "Found {} new files to sync ({} already present)",
        plan.new_count(),
        plan.skip_count()
    );
    plan
}

/// Whether anything, including a dangling symlink, sits at `path`.
#[must_use]
pub fn exists_on_disk(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

fn unclaimed(target: PathBuf, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !is_taken(&target) {
        return target;
    }

    (1..)
        .map(|n| with_suffix(&target, n))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or(target)
}

/// `dir/name.ext` → `dir/name_<n>.ext`.
pub(crate) fn with_suffix(path: &Path, n: usize) -> PathBuf {
    let mut name = OsString::new();
    if let Some(stem) = path.file_stem() {
        name.push(stem);
    }
    name.push(format!("_{n}"));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}
