//! Output formatters for run reports.
//!
//! - `text`: human-readable summary for terminals
//! - `json`: machine-readable documents for scripting
//!
//! # Example
//!
//! ```no_run
//! use photosync::cache::FingerprintCache;
//! use photosync::error::ExitCode;
//! use photosync::output::JsonOutput;
//! use photosync::scanner::HashAlgorithm;
//! use photosync::sync::{SyncOptions, SyncPipeline};
//! use std::path::Path;
//!
//! let options = SyncOptions::new(Path::new("/duplicates"), Path::new("/sorted"));
//! let pipeline = SyncPipeline::with_algorithm(options, HashAlgorithm::Md5);
//! let mut cache = FingerprintCache::in_memory(HashAlgorithm::Md5);
//! let (report, plan) = pipeline.run(&mut cache);
//!
//! JsonOutput::new(&plan, &report, ExitCode::Success)
//!     .write_to(&mut std::io::stdout(), true)
//!     .unwrap();
//! ```

pub mod json;
pub mod text;

pub use json::{JsonIndexOutput, JsonOutput, JsonOutputError};
