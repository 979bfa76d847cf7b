//! Human-readable run summaries.

use std::io::{self, Write};

use bytesize::ByteSize;

use crate::sync::{SyncReport, TreeReport};

/// Write the summary of one indexed tree.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_tree<W: Write>(writer: &mut W, label: &str, tree: &TreeReport) -> io::Result<()> {
    writeln!(writer, "{label}: {}", tree.root.display())?;
    writeln!(
        writer,
        "  {} files scanned, {} unique, {} in-tree duplicates",
        tree.scanned, tree.unique, tree.shadowed
    )?;
    writeln!(
        writer,
        "  {} hashed ({}), {} from cache",
        tree.hashed,
        ByteSize::b(tree.bytes_hashed),
        tree.cache_hits
    )?;
    if !tree.errors.is_empty() {
        writeln!(writer, "  {} errors:", tree.errors.len())?;
        for error in &tree.errors {
            writeln!(writer, "    {error}")?;
        }
    }
    if tree.cache_persist_failed {
        writeln!(writer, "  fingerprint cache could not be saved")?;
    }
    if tree.interrupted {
        writeln!(writer, "  interrupted")?;
    }
    Ok(())
}

/// Write the summary of a sync run.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_sync<W: Write>(writer: &mut W, report: &SyncReport) -> io::Result<()> {
    write_tree(writer, "Destination", &report.destination)?;
    write_tree(writer, "Source", &report.source)?;

    writeln!(
        writer,
        "Plan: {} new ({}), {} already present",
        report.plan.new,
        ByteSize::b(report.plan.new_bytes),
        report.plan.skip
    )?;

    let transfer = &report.transfer;
    if report.dry_run {
        writeln!(
            writer,
            "Dry run: {} files would be transferred (pass --apply to perform)",
            transfer.would_transfer
        )?;
    } else {
        writeln!(
            writer,
            "Transferred {} files ({})",
            transfer.transferred,
            ByteSize::b(transfer.bytes_transferred)
        )?;
    }
    if transfer.duplicates_removed > 0 {
        writeln!(
            writer,
            "Removed {} duplicates, freed {}",
            transfer.duplicates_removed,
            ByteSize::b(transfer.bytes_freed)
        )?;
    }
    if !transfer.failures.is_empty() {
        writeln!(writer, "{} actions failed:", transfer.failures.len())?;
        for failure in &transfer.failures {
            writeln!(writer, "  {}: {}", failure.path.display(), failure.error)?;
        }
    }

    let status = if report.interrupted {
        "interrupted"
    } else {
        "completed"
    };
    writeln!(
        writer,
        "Sync {status} in {:.1} minutes",
        report.elapsed_secs / 60.0
    )
}
