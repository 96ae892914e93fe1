//! Configuration types for photo-merge

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions recognized when no list is configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "mov", "mp4", "mts", "heic"];

/// What happens to a source file that is imported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    /// Copy files into the target, leaving the source untouched
    #[default]
    Copy,
    /// Move files into the target and delete duplicate sources
    Move,
}

impl FileOperation {
    pub fn removes_source(&self) -> bool {
        matches!(self, FileOperation::Move)
    }
}

/// Configuration for a merge run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tree to import from
    pub source_dir: PathBuf,

    /// Library to import into
    pub target_dir: PathBuf,

    /// Copy or move
    pub operation: FileOperation,

    /// Persisted index of the target tree (loaded if present, saved at the end)
    pub index_snapshot: Option<PathBuf>,

    /// Recognized media extensions, lower-case without a leading dot
    pub recognized_extensions: Vec<String>,

    /// Memoize digests of indexed files for the duration of the run
    pub cache_hashes: bool,

    /// Report snapshot entries whose file has disappeared
    pub verify_index: bool,

    /// Detailed log file
    pub log_file: Option<PathBuf>,

    /// Verbose output
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            target_dir: PathBuf::new(),
            operation: FileOperation::default(),
            index_snapshot: None,
            recognized_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            cache_hashes: false,
            verify_index: true,
            log_file: None,
            verbose: false,
        }
    }
}

impl Config {
    /// Recognized extensions normalized to lower-case without a leading dot
    pub fn normalized_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self
            .recognized_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        exts.sort();
        exts.dedup();
        exts
    }

    /// Check the configuration before any work starts
    ///
    /// Source and target must be set and must not contain one another, since
    /// imported files would otherwise be re-walked as sources (and, when
    /// moving, deleted as duplicates of themselves).
    pub fn validate(&self) -> Result<()> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(Error::Config("no source directory given".into()));
        }
        if self.target_dir.as_os_str().is_empty() {
            return Err(Error::Config("no target directory given".into()));
        }
        if !self.source_dir.is_dir() {
            return Err(Error::Config(format!(
                "source directory {} does not exist",
                self.source_dir.display()
            )));
        }
        if self.source_dir.starts_with(&self.target_dir) || self.target_dir.starts_with(&self.source_dir) {
            return Err(Error::Config(format!(
                "source {} and target {} overlap",
                self.source_dir.display(),
                self.target_dir.display()
            )));
        }
        if self.normalized_extensions().is_empty() {
            return Err(Error::Config("recognized_extensions is empty".into()));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# photo-merge configuration file (TOML)

# Tree to import from
source_dir = "/media/card/DCIM"

# Library to import into; files land in <target_dir>/YYYY/YYYY_MM/
target_dir = "/srv/photos"

# "copy" leaves the source untouched.
# "move" moves new files and deletes sources whose content is already in the library.
operation = "copy"

# Persisted index of the target tree. Loaded instead of re-indexing when it
# exists, written back at the end of every run. Re-index (delete it) whenever
# the library is changed by anything other than photo-merge.
# index_snapshot = "/srv/photos.index.json"

# Media extensions to import (case-insensitive)
recognized_extensions = ["jpg", "mov", "mp4", "mts", "heic"]

# Remember digests of library files that were compared during this run
cache_hashes = false

# Warn about snapshot entries whose file no longer exists
verify_index = true

# Detailed (debug level) log file
# log_file = "/var/log/photo-merge.log"

verbose = false
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_extensions() {
        let config = Config::default();
        assert_eq!(
            config.normalized_extensions(),
            vec!["heic", "jpg", "mov", "mp4", "mts"]
        );
        assert_eq!(config.operation, FileOperation::Copy);
        assert!(config.verify_index);
    }

    #[test]
    fn test_normalized_extensions() {
        let config = Config {
            recognized_extensions: vec![".JPG".into(), "jpg".into(), " Mov ".into(), "".into()],
            ..Config::default()
        };
        assert_eq!(config.normalized_extensions(), vec!["jpg", "mov"]);
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("library/incoming");
        fs::create_dir_all(&source).unwrap();

        let config = Config {
            source_dir: source,
            target_dir: dir.path().join("library"),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_accepts_disjoint_trees() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("card");
        fs::create_dir_all(&source).unwrap();

        let config = Config {
            source_dir: source,
            target_dir: dir.path().join("library"),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_existing_source() {
        let dir = tempdir().unwrap();
        let config = Config {
            source_dir: dir.path().join("nope"),
            target_dir: dir.path().join("library"),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::sample_config()).unwrap();
        assert_eq!(config.target_dir, PathBuf::from("/srv/photos"));
        assert_eq!(config.operation, FileOperation::Copy);
        assert!(config.index_snapshot.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merge.toml");
        fs::write(
            &path,
            r#"
source_dir = "/a"
target_dir = "/b"
operation = "move"
index_snapshot = "/b.json"
"#,
        )
        .unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.source_dir, PathBuf::from("/a"));
        assert_eq!(loaded.operation, FileOperation::Move);
        assert_eq!(loaded.index_snapshot, Some(PathBuf::from("/b.json")));
        assert_eq!(loaded.recognized_extensions, Config::default().recognized_extensions);
        assert!(loaded.verify_index);
    }

    #[test]
    fn test_load_from_file_errors() {
        let dir = tempdir().unwrap();
        let missing = Config::load_from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::ReadError { .. }));

        let path = dir.path().join("bad.toml");
        fs::write(&path, "operation = \"teleport\"").unwrap();
        let bad = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(bad, ConfigError::ParseError { .. }));
        assert!(bad.to_string().contains("bad.toml"));
    }
}
