//! CLI argument parsing with clap

use crate::config::{Config, FileOperation};
use clap::Parser;
use std::path::PathBuf;

/// photo-merge - Merge a photo/video tree into a date-organized library
///
/// New media is copied (or moved) into `<target>/YYYY/YYYY_MM/`. Files whose
/// content already exists in the library are recognized by capture time,
/// size and content hash, and are never copied twice.
#[derive(Parser, Debug, Default)]
#[command(name = "photo-merge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// CLI arguments override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Source tree to import from
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Target library to import into
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// Move new files instead of copying, and delete sources that are duplicates
    #[arg(short, long)]
    pub remove_source: bool,

    /// Index snapshot of the target: loaded if it exists, saved at the end
    #[arg(long, env = "PHOTO_MERGE_INDEX_DB")]
    pub index_db: Option<PathBuf>,

    /// Detailed (debug level) log file
    #[arg(long)]
    pub logfile: Option<PathBuf>,

    /// Remember digests of library files compared during this run
    #[arg(long)]
    pub cache_hashes: bool,

    /// Do not check a loaded snapshot for missing files
    #[arg(long)]
    pub no_verify_index: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub sample_config: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Write the log file as JSON
    #[arg(long)]
    pub json_log: bool,
}

impl Cli {
    /// Get config file name (without extension) for log messages
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref source) = self.source {
            config.source_dir = source.clone();
        }
        if let Some(ref target) = self.target {
            config.target_dir = target.clone();
        }
        if self.remove_source {
            config.operation = FileOperation::Move;
        }
        if let Some(ref index_db) = self.index_db {
            config.index_snapshot = Some(index_db.clone());
        }
        if let Some(ref logfile) = self.logfile {
            config.log_file = Some(logfile.clone());
        }
        if self.cache_hashes {
            config.cache_hashes = true;
        }
        if self.no_verify_index {
            config.verify_index = false;
        }
        if self.verbose {
            config.verbose = true;
        }

        config
    }

    /// Convert CLI arguments to Config (without config file)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_flags() {
        let cli = Cli::parse_from(["photo-merge", "-s", "/card", "-t", "/lib", "-r", "-v"]);
        let config = cli.to_config();
        assert_eq!(config.source_dir, PathBuf::from("/card"));
        assert_eq!(config.target_dir, PathBuf::from("/lib"));
        assert_eq!(config.operation, FileOperation::Move);
        assert!(config.verbose);
        assert!(config.verify_index);
        assert!(!config.cache_hashes);
        assert_eq!(config.index_snapshot, None);
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let file_config = Config {
            source_dir: PathBuf::from("/from-file"),
            target_dir: PathBuf::from("/lib-from-file"),
            index_snapshot: Some(PathBuf::from("/file.db")),
            ..Config::default()
        };

        let cli = Cli::parse_from([
            "photo-merge",
            "--source",
            "/card",
            "--index-db",
            "/photo_index.db",
            "--no-verify-index",
            "--cache-hashes",
        ]);
        let config = cli.merge_with_config(file_config);

        assert_eq!(config.source_dir, PathBuf::from("/card"));
        assert_eq!(config.target_dir, PathBuf::from("/lib-from-file"));
        assert_eq!(config.index_snapshot, Some(PathBuf::from("/photo_index.db")));
        assert_eq!(config.operation, FileOperation::Copy);
        assert!(!config.verify_index);
        assert!(config.cache_hashes);
    }

    #[test]
    fn test_config_name() {
        let cli = Cli::parse_from(["photo-merge", "-C", "/etc/photo-merge/sdcard.toml"]);
        assert_eq!(cli.config_name().as_deref(), Some("sdcard"));
        assert_eq!(Cli::default().config_name(), None);
    }
}
