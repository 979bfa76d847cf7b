//! Cache key definitions.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Composite `path:mtime` key identifying one observed version of a file.
///
/// Paths that are valid Unicode appear verbatim. Any other path is written
/// as [`RAW_PATH_MARKER`] followed by the hex of its raw encoding, so two
/// distinct names never share a key. No real path contains a NUL, so the
/// marker cannot collide with a verbatim path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for `path` as last modified at `mtime`.
    #[must_use]
    pub fn new(path: &Path, mtime: SystemTime) -> Self {
        Self(format!("{}:{}", encode_path(path), mtime_nanos(mtime)))
    }

    /// The serialized key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the serialized key.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prefix of keys whose path is not valid Unicode.
pub const RAW_PATH_MARKER: char = '\0';

fn encode_path(path: &Path) -> Cow<'_, str> {
    match path.to_str() {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Owned(format!("{RAW_PATH_MARKER}{}", hex::encode(raw_bytes(path)))),
    }
}

#[cfg(unix)]
fn raw_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(windows)]
fn raw_bytes(path: &Path) -> Vec<u8> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str()
        .encode_wide()
        .flat_map(u16::to_le_bytes)
        .collect()
}

#[cfg(not(any(unix, windows)))]
fn raw_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

/// Signed nanoseconds relative to the Unix epoch.
#[must_use]
pub fn mtime_nanos(mtime: SystemTime) -> i128 {
    match mtime.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(before) => -(before.duration().as_nanos() as i128),
    }
}
