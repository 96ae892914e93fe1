//! Merge engine: import a source tree into an indexed library
//!
//! Every walked source entry is classified against the [`IndexStore`]:
//! - directories and unrecognized extensions are counted and skipped
//! - a file whose (timestamp, size) pair is not indexed is new
//! - otherwise the file's content digest is compared against every
//!   indexed file in that bucket; a match is a duplicate
//!
//! New files are copied (or moved) to `target/YYYY/YYYY_MM/` under a name
//! that does not exist yet, and their resolved path is appended to the
//! store. Duplicates are never copied.

use crate::config::FileOperation;
use crate::error::{Error, Result};
use crate::hash::{ContentDigest, ContentHasher};
use crate::index::IndexStore;
use crate::scan::{self, MediaFilter, ScanEntry};
use crate::time::{TimestampExtractor, TimestampKey};
use crate::transfer;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span, warn};

/// Counters for one merge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Every walked entry, directories included
    pub total: usize,
    pub directories: usize,
    pub skipped_extension: usize,
    pub duplicates: usize,
    pub new_files: usize,
    /// Entries skipped because of a per-file error
    pub failed: usize,
}

impl RunStatistics {
    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Directories: {}, Skipped by extension: {}, Duplicates: {}, New: {}, Failed: {}",
            self.total,
            self.directories,
            self.skipped_extension,
            self.duplicates,
            self.new_files,
            self.failed
        )
    }
}

/// The (timestamp, size) pair a media file is indexed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaKey {
    pub timestamp: TimestampKey,
    pub size: u64,
}

/// How a source entry relates to the current store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Directory,
    SkippedExtension,
    /// No file with this timestamp is indexed
    NewNoTimestampBucket(MediaKey),
    /// The timestamp is indexed but not with this size
    NewNoSizeBucket(MediaKey),
    /// Same timestamp and size as indexed files; needs a content comparison
    Collision(MediaKey),
}

/// What happened to one source entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Directory,
    SkippedExtension,
    Duplicate { existing: PathBuf },
    Imported { destination: PathBuf, operation: FileOperation },
    Failed { message: String },
}

/// Progress notification for one processed entry
#[derive(Debug)]
pub struct Progress<'a> {
    /// 1-based position of this entry
    pub done: usize,
    pub total: usize,
    pub path: &'a Path,
    pub outcome: &'a FileOutcome,
}

/// Classifies source files against an [`IndexStore`] and imports new ones
pub struct MergeEngine<'a> {
    filter: MediaFilter,
    extractor: &'a dyn TimestampExtractor,
    hasher: &'a dyn ContentHasher,
    operation: FileOperation,
    hash_cache: Option<HashMap<PathBuf, ContentDigest>>,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        filter: MediaFilter,
        extractor: &'a dyn TimestampExtractor,
        hasher: &'a dyn ContentHasher,
        operation: FileOperation,
    ) -> Self {
        Self {
            filter,
            extractor,
            hasher,
            operation,
            hash_cache: None,
        }
    }

    /// Remember digests of indexed files across collisions in this run
    pub fn with_hash_cache(mut self, enabled: bool) -> Self {
        self.hash_cache = enabled.then(HashMap::new);
        self
    }

    /// Classify `path` against the current state of `store`
    ///
    /// Unrecognized files are rejected before any timestamp lookup.
    pub fn classify(&self, store: &IndexStore, path: &Path) -> Result<Classification> {
        let metadata = fs::metadata(path)?;
        if metadata.is_dir() {
            return Ok(Classification::Directory);
        }
        if !self.filter.is_recognized(path) {
            return Ok(Classification::SkippedExtension);
        }

        let lookup = self.extractor.lookup(path);
        let key = MediaKey {
            timestamp: lookup.key(),
            size: metadata.len(),
        };
        debug!(?path, timestamp = %key.timestamp, source = lookup.source_name(), "Resolved capture time");

        if !store.contains_timestamp(&key.timestamp) {
            Ok(Classification::NewNoTimestampBucket(key))
        } else if store.bucket(&key.timestamp, key.size).is_none() {
            Ok(Classification::NewNoSizeBucket(key))
        } else {
            Ok(Classification::Collision(key))
        }
    }

    /// Find the first of `existing` whose content matches `candidate`
    ///
    /// Indexed files that have disappeared cannot match and are passed over.
    /// Any other hashing failure is returned, so an incomplete comparison
    /// never counts as "not a duplicate".
    pub fn resolve_collision(&mut self, candidate: &Path, existing: &[PathBuf]) -> Result<Option<PathBuf>> {
        let candidate_digest = self.hasher.digest(candidate)?;

        for path in existing {
            match path.try_exists() {
                Ok(true) => {}
                Ok(false) => {
                    warn!(?path, "Indexed file no longer exists, not comparing");
                    continue;
                }
                Err(e) => {
                    return Err(Error::HashComputation {
                        path: path.clone(),
                        message: format!("Cannot access indexed file: {}", e),
                    });
                }
            }
            if self.existing_digest(path)? == candidate_digest {
                debug!(?candidate, existing = ?path, "Content match");
                return Ok(Some(path.clone()));
            }
        }

        debug!(?candidate, "Content mismatch");
        Ok(None)
    }

    fn existing_digest(&mut self, path: &Path) -> Result<ContentDigest> {
        if let Some(cache) = &self.hash_cache
            && let Some(digest) = cache.get(path)
        {
            return Ok(*digest);
        }

        let digest = self.hasher.digest(path)?;
        if let Some(cache) = &mut self.hash_cache {
            cache.insert(path.to_path_buf(), digest);
        }
        Ok(digest)
    }

    /// Merge everything under `source_root` into `target_root`
    pub fn merge(&mut self, store: &mut IndexStore, source_root: &Path, target_root: &Path) -> Result<RunStatistics> {
        self.merge_with_progress(store, source_root, target_root, &mut |_| {})
    }

    /// Merge, reporting each processed entry to `progress`
    ///
    /// Stops at the first transfer error. Per-file errors are logged,
    /// counted as failed, and the run continues.
    pub fn merge_with_progress(
        &mut self,
        store: &mut IndexStore,
        source_root: &Path,
        target_root: &Path,
        progress: &mut dyn FnMut(&Progress<'_>),
    ) -> Result<RunStatistics> {
        let _span = span!(Level::INFO, "merge", ?source_root, ?target_root).entered();

        let walked = scan::walk(source_root);
        let mut stats = RunStatistics {
            total: walked.entries.len(),
            failed: walked.unreadable,
            ..RunStatistics::default()
        };
        info!(
            entries = stats.total,
            operation = ?self.operation,
            "Check and copy source path to target path"
        );

        for (i, entry) in walked.entries.iter().enumerate() {
            let path = entry.path();
            let _file_span = span!(Level::DEBUG, "file", ?path).entered();

            let outcome = match entry {
                ScanEntry::Directory(_) => FileOutcome::Directory,
                ScanEntry::File(_) => match self.process_file(store, path, target_root) {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(?path, error = %e, "Skipping file");
                        FileOutcome::Failed { message: e.to_string() }
                    }
                },
            };

            match &outcome {
                FileOutcome::Directory => stats.directories += 1,
                FileOutcome::SkippedExtension => stats.skipped_extension += 1,
                FileOutcome::Duplicate { .. } => stats.duplicates += 1,
                FileOutcome::Imported { .. } => stats.new_files += 1,
                FileOutcome::Failed { .. } => stats.failed += 1,
            }

            progress(&Progress {
                done: i + 1,
                total: stats.total,
                path,
                outcome: &outcome,
            });
        }

        info!("{}", stats.summary());
        Ok(stats)
    }

    fn process_file(&mut self, store: &mut IndexStore, path: &Path, target_root: &Path) -> Result<FileOutcome> {
        match self.classify(store, path)? {
            Classification::Directory => Ok(FileOutcome::Directory),
            Classification::SkippedExtension => {
                debug!(?path, "Skip by extension");
                Ok(FileOutcome::SkippedExtension)
            }
            Classification::NewNoTimestampBucket(key) => {
                debug!(?path, timestamp = %key.timestamp, "New file (no file with this timestamp)");
                self.import(store, path, key, target_root)
            }
            Classification::NewNoSizeBucket(key) => {
                debug!(?path, timestamp = %key.timestamp, size = key.size, "New file (no file with this size)");
                self.import(store, path, key, target_root)
            }
            Classification::Collision(key) => {
                let existing = store
                    .bucket(&key.timestamp, key.size)
                    .map(<[PathBuf]>::to_vec)
                    .unwrap_or_default();

                match self.resolve_collision(path, &existing)? {
                    Some(existing) => Ok(self.handle_duplicate(path, existing)),
                    None => {
                        debug!(?path, timestamp = %key.timestamp, size = key.size, "New file (same timestamp and size, different content)");
                        self.import(store, path, key, target_root)
                    }
                }
            }
        }
    }

    fn handle_duplicate(&self, path: &Path, existing: PathBuf) -> FileOutcome {
        debug!(source = ?path, target = ?existing, "The same target file already exists");

        if self.operation.removes_source() {
            let is_self = path
                .canonicalize()
                .map(|p| p == existing)
                .unwrap_or(false);
            if is_self {
                warn!(?path, "Duplicate resolves to itself, not removing");
            } else if let Err(e) = fs::remove_file(path) {
                warn!(?path, error = %e, "Failed to remove duplicate source");
            } else {
                debug!(?path, "Source removed");
            }
        }

        FileOutcome::Duplicate { existing }
    }

    fn import(&self, store: &mut IndexStore, path: &Path, key: MediaKey, target_root: &Path) -> Result<FileOutcome> {
        let destination = transfer::unique_destination(target_root, &key.timestamp, path)?;
        transfer::transfer(path, &destination, self.operation)?;

        let resolved = destination.canonicalize().unwrap_or(destination);
        info!(source = ?path, destination = ?resolved, timestamp = %key.timestamp, "Imported file");

        store.insert(key.timestamp, key.size, resolved.clone());
        Ok(FileOutcome::Imported {
            destination: resolved,
            operation: self.operation,
        })
    }
}
