//! photo-merge - Merge photo and video trees into a date-organized library
//!
//! This library provides:
//! - An index of the target library keyed by capture time and file size,
//!   persisted as a JSON snapshot
//! - Capture time extraction from EXIF (images) and FFprobe (videos)
//! - xxHash-based content comparison for files that share time and size
//! - Copy or move into `YYYY/YYYY_MM/` with collision-free file names

pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod index;
pub mod merge;
pub mod paths;
pub mod scan;
pub mod time;
pub mod transfer;

pub use cli::Cli;
pub use config::{Config, ConfigError, FileOperation};
pub use error::{Error, Result};
pub use hash::{ContentDigest, ContentHasher, XxHasher};
pub use index::IndexStore;
pub use merge::{Classification, FileOutcome, MergeEngine, Progress, RunStatistics};
pub use scan::MediaFilter;
pub use time::{MediaTimestampExtractor, TimestampExtractor, TimestampKey, TimestampLookup};
