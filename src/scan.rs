//! Directory traversal shared by index building and merging

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// One walked entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEntry {
    Directory(PathBuf),
    File(PathBuf),
}

impl ScanEntry {
    pub fn path(&self) -> &Path {
        match self {
            ScanEntry::Directory(p) | ScanEntry::File(p) => p,
        }
    }
}

/// Result of walking a tree
#[derive(Debug, Default)]
pub struct Scan {
    pub entries: Vec<ScanEntry>,
    /// Entries that could not be read and were skipped
    pub unreadable: usize,
}

/// Walk everything under `root` (not including `root` itself)
///
/// Entries are sorted by name within each directory. Hidden entries are left
/// out and hidden directories are not descended into. Symlinks are followed.
/// Unreadable entries are logged and counted, never fatal.
pub fn walk(root: &Path) -> Scan {
    let mut scan = Scan::default();

    if !root.exists() {
        warn!(?root, "Directory does not exist, nothing to scan");
        return scan;
    }

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        match entry {
            Ok(entry) => {
                let path = entry.path().to_path_buf();
                if entry.file_type().is_dir() {
                    scan.entries.push(ScanEntry::Directory(path));
                } else {
                    scan.entries.push(ScanEntry::File(path));
                }
            }
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "Skipping unreadable entry");
                scan.unreadable += 1;
            }
        }
    }

    debug!(?root, entries = scan.entries.len(), unreadable = scan.unreadable, "Walked directory");
    scan
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Recognized media extension set
#[derive(Debug, Clone)]
pub struct MediaFilter {
    extensions: Vec<String>,
}

impl MediaFilter {
    /// Extensions are compared case-insensitively; a leading dot is ignored
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn is_recognized(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EXTENSIONS)
    }
}
