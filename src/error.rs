//! Error types for photo-merge

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for photo-merge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for photo-merge
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index snapshot {path} is corrupt: {message}")]
    CorruptIndex { path: PathBuf, message: String },

    #[error("Failed to transfer {from} to {to}: {source}")]
    Transfer {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("File hash computation failed for {path}: {message}")]
    HashComputation { path: PathBuf, message: String },

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Failed to extract video metadata from {path}: {message}")]
    VideoMetadata { path: PathBuf, message: String },

    #[error("FFprobe not found. Please install FFmpeg and ensure ffprobe is in PATH")]
    FfprobeNotFound,

    #[error("Index snapshot error: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl Error {
    /// Whether this error must stop the whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CorruptIndex { .. } | Error::Transfer { .. } | Error::Snapshot(_) | Error::Config(_)
        )
    }
}
