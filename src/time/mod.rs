//! Capture time resolution
//!
//! A file's capture time is resolved in three steps:
//! 1. Embedded creation metadata (EXIF for images, FFprobe for videos)
//! 2. File system inode change time
//! 3. The "unknown" sentinel
//!
//! Failures in one step are never surfaced; they fall through to the next.

pub mod exif;
pub mod key;
pub mod video;

pub use key::{TimestampKey, UNKNOWN_KEY};

use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Extensions read with the EXIF parser
const EXIF_EXTENSIONS: &[&str] = &["jpg", "jpeg", "heic", "heif", "tif", "tiff", "png", "webp"];

/// Extensions read with FFprobe
const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "mts", "m2ts", "m4v", "3gp", "avi"];

/// Outcome of a capture time lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampLookup {
    /// Found in the file's embedded creation metadata
    Embedded(NaiveDateTime),
    /// Taken from the file system as a fallback
    FileSystem(NaiveDateTime),
    /// Nothing usable was found
    Unknown,
}

impl TimestampLookup {
    /// The index key for this outcome
    pub fn key(&self) -> TimestampKey {
        match self {
            TimestampLookup::Embedded(dt) | TimestampLookup::FileSystem(dt) => {
                TimestampKey::from_datetime(dt)
            }
            TimestampLookup::Unknown => TimestampKey::unknown(),
        }
    }

    pub fn source_name(&self) -> &'static str {
        match self {
            TimestampLookup::Embedded(_) => "embedded",
            TimestampLookup::FileSystem(_) => "filesystem",
            TimestampLookup::Unknown => "unknown",
        }
    }
}

/// Resolves the capture time of a file
pub trait TimestampExtractor {
    fn lookup(&self, path: &Path) -> TimestampLookup;
}

/// Default extractor: EXIF / FFprobe, then inode change time, then unknown
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaTimestampExtractor;

impl MediaTimestampExtractor {
    pub fn new() -> Self {
        Self
    }

    fn embedded(&self, path: &Path) -> Option<NaiveDateTime> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())?;

        if EXIF_EXTENSIONS.contains(&ext.as_str()) {
            match exif::extract_exif_time(path) {
                Ok(dt) => return Some(dt),
                Err(e) => debug!(?path, error = %e, "No EXIF capture time"),
            }
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            match video::extract_video_time(path) {
                Ok(dt) => return Some(dt),
                Err(e) => debug!(?path, error = %e, "No video creation time"),
            }
        }

        None
    }
}

impl TimestampExtractor for MediaTimestampExtractor {
    fn lookup(&self, path: &Path) -> TimestampLookup {
        if let Some(dt) = self.embedded(path) {
            return TimestampLookup::Embedded(dt);
        }

        match change_time(path) {
            Some(dt) => {
                debug!(?path, "Using file system change time as fallback");
                TimestampLookup::FileSystem(dt)
            }
            None => {
                debug!(?path, "No usable timestamp, filing under unknown");
                TimestampLookup::Unknown
            }
        }
    }
}

/// Inode change time in local time (modification time where ctime is unavailable)
fn change_time(path: &Path) -> Option<NaiveDateTime> {
    let metadata = fs::metadata(path).ok()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let dt = DateTime::from_timestamp(metadata.ctime(), metadata.ctime_nsec() as u32)?;
        Some(dt.with_timezone(&Local).naive_local())
    }

    #[cfg(not(unix))]
    {
        let modified = metadata.modified().ok()?;
        let dt: DateTime<Local> = modified.into();
        Some(dt.naive_local())
    }
}
