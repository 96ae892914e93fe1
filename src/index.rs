//! Index of existing library files keyed by capture timestamp, then size
//!
//! The persisted snapshot is a JSON object of objects of path arrays:
//!
//! ```json
//! {"2014-12-13_17-00-35": {"1048576": ["/srv/photos/2014/2014_12/IMG_1.jpg"]}}
//! ```
//!
//! The store is an approximation of the library. Paths are only re-checked
//! when a collision forces a content comparison, so a snapshot reused after
//! the library was changed by other means can miss duplicates.

use crate::error::{Error, Result};
use crate::scan::{self, MediaFilter, ScanEntry};
use crate::time::{TimestampExtractor, TimestampKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Paths sharing one (timestamp, size) pair, in insertion order
pub type IndexEntry = Vec<PathBuf>;

/// Two-level index: timestamp key -> size in bytes -> paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexStore {
    buckets: BTreeMap<TimestampKey, BTreeMap<u64, IndexEntry>>,
}

impl IndexStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every recognized file under `root`
    pub fn build(root: &Path, filter: &MediaFilter, extractor: &dyn TimestampExtractor) -> Self {
        Self::build_with_progress(root, filter, extractor, &mut |_, _, _| {})
    }

    /// Index every recognized file under `root`, reporting `(done, total, path)`
    pub fn build_with_progress(
        root: &Path,
        filter: &MediaFilter,
        extractor: &dyn TimestampExtractor,
        progress: &mut dyn FnMut(usize, usize, &Path),
    ) -> Self {
        let mut store = Self::new();
        let walked = scan::walk(root);
        let total = walked.entries.len();

        for (i, entry) in walked.entries.iter().enumerate() {
            progress(i + 1, total, entry.path());

            let path = match entry {
                ScanEntry::Directory(_) => continue,
                ScanEntry::File(path) => path,
            };

            if !filter.is_recognized(path) {
                debug!(?path, "Skip by extension");
                continue;
            }

            let size = match fs::metadata(path) {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!(?path, error = %e, "Cannot read file size, not indexed");
                    continue;
                }
            };

            let lookup = extractor.lookup(path);
            let key = lookup.key();
            let resolved = path.canonicalize().unwrap_or_else(|_| path.clone());
            debug!(path = ?resolved, %key, size, source = lookup.source_name(), "Indexed");
            store.insert(key, size, resolved);
        }

        info!(
            ?root,
            timestamps = store.timestamp_count(),
            files = store.file_count(),
            "Built index"
        );
        store
    }

    /// Load a snapshot written by [`IndexStore::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let store: Self = serde_json::from_reader(reader).map_err(|e| Error::CorruptIndex {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        info!(
            ?path,
            timestamps = store.timestamp_count(),
            files = store.file_count(),
            "Loaded index snapshot"
        );
        Ok(store)
    }

    /// Write the whole store to `path`, replacing any existing snapshot
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);
        let file = File::create(&temp_path).map_err(|e| {
            Error::Snapshot(format!("Failed to create {}: {}", temp_path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer(&mut writer, self)
            .map_err(|e| Error::Snapshot(format!("Failed to write snapshot: {}", e)))?;
        writer
            .flush()
            .map_err(|e| Error::Snapshot(format!("Failed to write snapshot: {}", e)))?;
        drop(writer);

        fs::rename(&temp_path, path).map_err(|e| {
            Error::Snapshot(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        info!(?path, files = self.file_count(), "Saved index snapshot");
        Ok(())
    }

    /// Append `path` to the `(key, size)` bucket, creating it as needed
    pub fn insert(&mut self, key: TimestampKey, size: u64, path: PathBuf) {
        self.buckets
            .entry(key)
            .or_default()
            .entry(size)
            .or_default()
            .push(path);
    }

    pub fn contains_timestamp(&self, key: &TimestampKey) -> bool {
        self.buckets.contains_key(key)
    }

    /// Paths indexed under `(key, size)`
    pub fn bucket(&self, key: &TimestampKey, size: u64) -> Option<&[PathBuf]> {
        self.buckets
            .get(key)
            .and_then(|sizes| sizes.get(&size))
            .map(Vec::as_slice)
    }

    /// Number of distinct timestamp keys
    pub fn timestamp_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of indexed paths
    pub fn file_count(&self) -> usize {
        self.buckets
            .values()
            .flat_map(|sizes| sizes.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Every `(key, size, path)` triple in key order
    pub fn iter(&self) -> impl Iterator<Item = (&TimestampKey, u64, &Path)> {
        self.buckets.iter().flat_map(|(key, sizes)| {
            sizes
                .iter()
                .flat_map(move |(size, paths)| paths.iter().map(move |p| (key, *size, p.as_path())))
        })
    }

    /// Indexed paths whose file no longer exists
    ///
    /// Reporting only; the store is never pruned.
    pub fn stale_paths(&self) -> Vec<&Path> {
        self.iter()
            .map(|(_, _, path)| path)
            .filter(|path| !path.exists())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimestampLookup;
    use tempfile::tempdir;

    fn key(s: &str) -> TimestampKey {
        TimestampKey::parse(s).unwrap()
    }

    struct UnknownTime;

    impl TimestampExtractor for UnknownTime {
        fn lookup(&self, _path: &Path) -> TimestampLookup {
            TimestampLookup::Unknown
        }
    }

    fn round_trip(store: &IndexStore) -> IndexStore {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        store.save(&path).unwrap();
        IndexStore::load(&path).unwrap()
    }

    #[test]
    fn test_insert_and_query() {
        let mut store = IndexStore::new();
        let k = key("2020-01-01_00-00-00");
        assert!(!store.contains_timestamp(&k));

        store.insert(k.clone(), 100, PathBuf::from("/t/a.jpg"));
        store.insert(k.clone(), 100, PathBuf::from("/t/b.jpg"));
        store.insert(k.clone(), 200, PathBuf::from("/t/c.jpg"));

        assert!(store.contains_timestamp(&k));
        assert_eq!(
            store.bucket(&k, 100).unwrap(),
            &[PathBuf::from("/t/a.jpg"), PathBuf::from("/t/b.jpg")]
        );
        assert!(store.bucket(&k, 300).is_none());
        assert_eq!(store.timestamp_count(), 1);
        assert_eq!(store.file_count(), 3);
    }

    #[test]
    fn test_round_trip_empty() {
        let store = IndexStore::new();
        assert_eq!(round_trip(&store), store);
    }

    #[test]
    fn test_round_trip_single() {
        let mut store = IndexStore::new();
        store.insert(key("2014-12-13_17-00-35"), 1_048_576, PathBuf::from("/lib/2014/2014_12/IMG_1.jpg"));
        assert_eq!(round_trip(&store), store);
    }

    #[test]
    fn test_round_trip_many_preserves_order() {
        let mut store = IndexStore::new();
        store.insert(key("2020-01-01_00-00-00"), 100, PathBuf::from("/t/z.jpg"));
        store.insert(key("2020-01-01_00-00-00"), 100, PathBuf::from("/t/a.jpg"));
        store.insert(key("2020-01-01_00-00-00"), u64::MAX, PathBuf::from("/t/huge.mov"));
        store.insert(key("0000-00-00_00-00-00"), 0, PathBuf::from("/t/empty.mp4"));
        store.insert(key("1999-12-31_23-59-59"), 7, PathBuf::from("/t/old.heic"));

        let loaded = round_trip(&store);
        assert_eq!(loaded, store);
        assert_eq!(
            loaded.bucket(&key("2020-01-01_00-00-00"), 100).unwrap(),
            &[PathBuf::from("/t/z.jpg"), PathBuf::from("/t/a.jpg")]
        );
    }

    #[test]
    fn test_snapshot_format() {
        let mut store = IndexStore::new();
        store.insert(key("2014-12-13_17-00-35"), 100, PathBuf::from("/t/a.jpg"));
        let json = serde_json::to_string(&store).unwrap();
        assert_eq!(json, r#"{"2014-12-13_17-00-35":{"100":["/t/a.jpg"]}}"#);
    }

    #[test]
    fn test_load_hand_written_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo_index.db");
        fs::write(
            &path,
            r#"{"2014-12-13_17-00-35": {"2048": ["/p/a.jpg", "/p/b.jpg"]}, "0000-00-00_00-00-00": {"5": ["/p/c.mov"]}}"#,
        )
        .unwrap();

        let store = IndexStore::load(&path).unwrap();
        assert_eq!(store.file_count(), 3);
        assert_eq!(store.bucket(&key("2014-12-13_17-00-35"), 2048).unwrap().len(), 2);
        assert!(store.contains_timestamp(&TimestampKey::unknown()));
    }

    #[test]
    fn test_save_leaves_siblings_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo_index.db");
        let sibling = dir.path().join("photo_index.tmp");
        fs::write(&sibling, b"unrelated").unwrap();

        let mut store = IndexStore::new();
        store.insert(key("2014-12-13_17-00-35"), 1, PathBuf::from("/t/a.jpg"));
        store.save(&path).unwrap();

        assert_eq!(fs::read(&sibling).unwrap(), b"unrelated");
        assert!(!dir.path().join("photo_index.db.tmp").exists());
        assert_eq!(IndexStore::load(&path).unwrap(), store);
    }

    #[test]
    fn test_save_snapshot_named_tmp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.tmp");

        let mut store = IndexStore::new();
        store.insert(key("2014-12-13_17-00-35"), 1, PathBuf::from("/t/a.jpg"));
        store.save(&path).unwrap();
        store.save(&path).unwrap();

        assert_eq!(IndexStore::load(&path).unwrap(), store);
        assert!(!dir.path().join("index.tmp.tmp").exists());
    }

    #[test]
    fn test_load_corrupt() {
        let dir = tempdir().unwrap();
        let cases = [
            "not json at all",
            "[1, 2, 3]",
            r#"{"2014-12-13_17-00-35": ["/p/a.jpg"]}"#,
            r#"{"2014-12-13_17-00-35": {"100": "/p/a.jpg"}}"#,
            r#"{"2014-12-13_17-00-35": {"big": ["/p/a.jpg"]}}"#,
            r#"{"2014-12-13_17-00-35": {"-1": ["/p/a.jpg"]}}"#,
            r#"{"last tuesday": {"100": ["/p/a.jpg"]}}"#,
            r#"{"٢٠١٤-١٢-١٣_١٧-٠٠-٣٥": {"100": ["/p/a.jpg"]}}"#,
            r#"{"2014-12-13_17-00-35": {"100": [42]}}"#,
        ];

        for (i, content) in cases.iter().enumerate() {
            let path = dir.path().join(format!("corrupt_{}.json", i));
            fs::write(&path, content).unwrap();
            let err = IndexStore::load(&path).unwrap_err();
            assert!(
                matches!(err, Error::CorruptIndex { .. }),
                "case {} should be corrupt, got {:?}",
                i,
                err
            );
        }
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/index.json");

        let mut first = IndexStore::new();
        first.insert(key("2020-01-01_00-00-00"), 1, PathBuf::from("/t/a.jpg"));
        first.save(&path).unwrap();

        let second = IndexStore::new();
        second.save(&path).unwrap();
        assert_eq!(IndexStore::load(&path).unwrap(), second);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_build_skips_dirs_and_unknown_extensions() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("library");
        fs::create_dir_all(root.join("2020/2020_01")).unwrap();
        fs::write(root.join("2020/2020_01/a.jpg"), vec![0u8; 10]).unwrap();
        fs::write(root.join("2020/2020_01/b.JPG"), vec![1u8; 10]).unwrap();
        fs::write(root.join("notes.txt"), b"ignore me").unwrap();

        let store = IndexStore::build(&root, &MediaFilter::default(), &UnknownTime);
        let root = root.canonicalize().unwrap();

        assert_eq!(store.file_count(), 2);
        assert_eq!(
            store.bucket(&TimestampKey::unknown(), 10).unwrap(),
            &[root.join("2020/2020_01/a.jpg"), root.join("2020/2020_01/b.JPG")]
        );
        assert!(store.iter().all(|(_, _, p)| p.is_absolute()));
    }

    #[test]
    fn test_build_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let store = IndexStore::build(&dir.path().join("nothing"), &MediaFilter::default(), &UnknownTime);
        assert!(store.is_empty());
    }

    #[test]
    fn test_stale_paths() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("here.jpg");
        fs::write(&present, b"x").unwrap();

        let mut store = IndexStore::new();
        store.insert(key("2020-01-01_00-00-00"), 1, present.clone());
        store.insert(key("2020-01-01_00-00-00"), 1, dir.path().join("gone.jpg"));

        let stale = store.stale_paths();
        assert_eq!(stale, vec![dir.path().join("gone.jpg").as_path()]);
        assert_eq!(store.file_count(), 2);
    }
}
