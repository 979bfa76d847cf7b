//! Placement strategies.
//!
//! A [`PlacementStrategy`] maps a new source file to its path under the
//! destination root:
//!
//! - [`MirrorLayout`]: keep the path relative to the source root
//! - [`DateLayout`]: `YYYY/MM[/DD]/<file name>`, with the date supplied by a
//!   [`DateOracle`] and an "unknown" bucket when no date is available

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::index::FileRecord;

/// Maps a source record to its target path.
pub trait PlacementStrategy: Send + Sync {
    /// Absolute target path for `record`.
    fn target(&self, record: &FileRecord) -> PathBuf;
}

/// Supplies the capture date of a file.
///
/// Returning `None` is not an error; the layout falls back to its
/// unknown bucket.
pub trait DateOracle: Send + Sync {
    /// Date associated with `record`, if any.
    fn date(&self, record: &FileRecord) -> Option<NaiveDate>;
}

/// Destination layout selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Date buckets (`YYYY/MM/<name>`)
    #[default]
    Date,
    /// Same relative path as in the source tree
    Mirror,
}

/// Where the date of a file comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DateSource {
    /// Local-time modification date
    #[default]
    Modified,
    /// Date embedded in the file name
    Filename,
    /// File name date, else modification date
    FilenameThenModified,
}

impl DateSource {
    /// Oracle implementing this source.
    #[must_use]
    pub fn oracle(self) -> Box<dyn DateOracle> {
        match self {
            Self::Modified => Box::new(ModifiedTimeOracle),
            Self::Filename => Box::new(FilenameDateOracle),
            Self::FilenameThenModified => Box::new(ChainOracle::new(vec![
                Box::new(FilenameDateOracle),
                Box::new(ModifiedTimeOracle),
            ])),
        }
    }
}

/// Depth of the date buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DateGranularity {
    /// `YYYY/MM`
    #[default]
    Month,
    /// `YYYY/MM/DD`
    Day,
}

impl DateGranularity {
    /// Relative bucket directory for `date`.
    #[must_use]
    pub fn bucket(self, date: NaiveDate) -> PathBuf {
        let mut bucket = PathBuf::from(format!("{:04}", date.year()));
        bucket.push(format!("{:02}", date.month()));
        if self == Self::Day {
            bucket.push(format!("{:02}", date.day()));
        }
        bucket
    }
}

/// Date from the file's modification time, in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifiedTimeOracle;

impl DateOracle for ModifiedTimeOracle {
    fn date(&self, record: &FileRecord) -> Option<NaiveDate> {
        let local: DateTime<Local> = record.modified.into();
        Some(local.date_naive())
    }
}

/// Date embedded in the file name, e.g. `IMG_20230514_101500.jpg`,
/// `2023-05-14 party.mov` or `scan_2023_05_14.png`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameDateOracle;

fn filename_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|\D)((?:19|20)\d{2})[-_]?(\d{2})[-_]?(\d{2})(?:\D|$)")
            .expect("file name date pattern is valid")
    })
}

impl FilenameDateOracle {
    /// Parse the first valid date found in `name`.
    #[must_use]
    pub fn parse(name: &str) -> Option<NaiveDate> {
        let pattern = filename_date_pattern();
        let mut start = 0;
        while start < name.len() {
            let caps = pattern.captures_at(name, start)?;
            let year = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let day = caps[3].parse().ok()?;
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
            // Restart just after the rejected year so overlapping digits get a chance.
            start = caps.get(1).map_or(name.len(), |m| m.start() + 1);
        }
        None
    }
}

impl DateOracle for FilenameDateOracle {
    fn date(&self, record: &FileRecord) -> Option<NaiveDate> {
        Self::parse(&record.file_name().to_string_lossy())
    }
}

/// First oracle that yields a date wins.
pub struct ChainOracle {
    oracles: Vec<Box<dyn DateOracle>>,
}

impl ChainOracle {
    /// Chain `oracles` in priority order.
    #[must_use]
    pub fn new(oracles: Vec<Box<dyn DateOracle>>) -> Self {
        Self { oracles }
    }
}

impl DateOracle for ChainOracle {
    fn date(&self, record: &FileRecord) -> Option<NaiveDate> {
        self.oracles.iter().find_map(|o| o.date(record))
    }
}

/// Mirror the source-relative path under the destination root.
#[derive(Debug, Clone)]
pub struct MirrorLayout {
    root: PathBuf,
}

impl MirrorLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl PlacementStrategy for MirrorLayout {
    fn target(&self, record: &FileRecord) -> PathBuf {
        if record.relative.is_absolute() {
            self.root.join(record.file_name())
        } else {
            self.root.join(&record.relative)
        }
    }
}

/// Date-bucketed layout: `<root>/<bucket>/<file name>`.
pub struct DateLayout {
    root: PathBuf,
    oracle: Box<dyn DateOracle>,
    granularity: DateGranularity,
    unknown_bucket: String,
}

impl DateLayout {
    /// Month buckets from modification time, unknown bucket `"unknown"`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            oracle: Box::new(ModifiedTimeOracle),
            granularity: DateGranularity::Month,
            unknown_bucket: "unknown".to_string(),
        }
    }

    /// Use `oracle` for dates.
    #[must_use]
    pub fn with_oracle(mut self, oracle: Box<dyn DateOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Set the bucket depth.
    #[must_use]
    pub fn with_granularity(mut self, granularity: DateGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Directory for files without a date.
    #[must_use]
    pub fn with_unknown_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.unknown_bucket = bucket.into();
        self
    }
}

impl PlacementStrategy for DateLayout {
    fn target(&self, record: &FileRecord) -> PathBuf {
        let bucket = match self.oracle.date(record) {
            Some(date) => self.granularity.bucket(date),
            None => PathBuf::from(&self.unknown_bucket),
        };
        self.root.join(bucket).join(record.file_name())
    }
}
