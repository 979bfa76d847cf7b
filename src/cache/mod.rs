//! Fingerprint caching module.
//!
//! This module provides persistent storage for file fingerprints so that
//! repeated runs over hundreds of thousands of unchanged files do not pay
//! the hashing cost again.
//!
//! # Architecture
//!
//! The caching system is split into two components:
//!
//! * [`store`]: The in-memory map, its JSON persistence and atomic replacement.
//! * [`entry`]: The composite cache key and its modification-time encoding.
//!
//! # Cache Invalidation
//!
//! Entries are keyed by file path *and* modification time. When a file is
//! modified its mtime changes, the key changes, and the old entry simply
//! becomes unreachable. There is no separate dirty bit and no eviction.
//!
//! # Durability
//!
//! The cache document is written to a temporary file next to the target and
//! renamed over it, so a crash or a failed write never leaves a truncated
//! cache behind. A cache file that cannot be parsed is treated as empty.

pub mod entry;
pub mod store;

pub use entry::CacheKey;
pub use store::{CacheError, CacheResult, FingerprintCache, CACHE_VERSION};
