//! File actions module.
//!
//! Applies a reconciliation [`Plan`](crate::plan::Plan) to disk:
//! - Move or copy new files into the destination tree
//! - Keep, trash or delete source files whose content already exists
//! - Dry run (default) that only logs what would happen
//!
//! ```no_run
//! use photosync::actions::{TransferConfig, TransferExecutor, TransferMode};
//! use photosync::plan::Plan;
//!
//! let executor = TransferExecutor::new(
//!     TransferConfig::default()
//!         .with_mode(TransferMode::Copy)
//!         .with_dry_run(false),
//! );
//! let report = executor.apply_all(&Plan::default());
//! println!("{} transferred, {} failed", report.transferred, report.failure_count());
//! ```

pub mod transfer;

pub use transfer::{
    DuplicatePolicy, TransferConfig, TransferError, TransferExecutor, TransferFailure,
    TransferMode, TransferOutcome, TransferReport,
};
