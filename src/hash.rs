//! Content digests for duplicate confirmation
//!
//! Two files are treated as identical when their full-content XXH3-128
//! digests match. Files are streamed, so large videos are never held in
//! memory.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::trace;
use xxhash_rust::xxh3::Xxh3;

/// Read buffer size (256KB)
const BUFFER_SIZE: usize = 256 * 1024;

/// 128-bit content digest
pub type ContentDigest = u128;

/// Computes a deterministic digest of a file's full byte content
pub trait ContentHasher {
    fn digest(&self, path: &Path) -> Result<ContentDigest>;
}

/// Streaming XXH3-128 hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct XxHasher;

impl XxHasher {
    pub fn new() -> Self {
        Self
    }
}

impl ContentHasher for XxHasher {
    fn digest(&self, path: &Path) -> Result<ContentDigest> {
        compute_file_hash(path)
    }
}

/// Compute the XXH3-128 digest of a file
pub fn compute_file_hash(path: &Path) -> Result<ContentDigest> {
    let file = File::open(path).map_err(|e| Error::HashComputation {
        path: path.to_path_buf(),
        message: format!("Failed to open file: {}", e),
    })?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer).map_err(|e| Error::HashComputation {
            path: path.to_path_buf(),
            message: format!("Failed to read file: {}", e),
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let hash = hasher.digest128();
    trace!(?path, hash = %format!("{:032x}", hash), "Computed file hash");
    Ok(hash)
}
