//! photo-merge - Merge photo and video trees into a date-organized library
//!
//! Indexes (or loads the index of) the target library, imports every new
//! media file from the source tree and skips content that is already there.

use anyhow::{Context, Result};
use clap::Parser;
use photo_merge::{
    Cli, Config, FileOutcome, IndexStore, MediaFilter, MediaTimestampExtractor, MergeEngine, RunStatistics,
    XxHasher, paths,
};
use std::path::{Path, PathBuf};
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::LevelFilter, fmt, prelude::*};

// CLI Output Module
mod cli_output {
    //! Colored console output for the summary and progress line

    use crossterm::{
        ExecutableCommand, QueueableCommand, cursor,
        style::{Color, Print, Stylize, style},
        terminal::{Clear, ClearType},
    };
    use std::io::{IsTerminal, Write, stdout};
    use std::path::Path;

    /// Width of the progress bar in cells
    const BAR_WIDTH: usize = 30;

    /// CLI theme colors
    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(&format!("{}\n", "─".repeat(60))));
    }

    pub fn print_title(title: &str) {
        let width: usize = 60;
        let padding = width.saturating_sub(title.len()) / 2;
        let left_pad = " ".repeat(padding.saturating_sub(1));

        let _ = stdout().execute(Print(&format!(
            "{}{} {} {}\n",
            left_pad,
            "╔".bold(),
            title.bold(),
            "╗".bold(),
        )));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_stat(key: &str, value: &str, color: Color) {
        let key_styled = style(key).with(CliTheme::HINT);
        let value_styled = style(value).with(color).bold();
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(key_styled));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(value_styled));
        let _ = stdout().execute(Print("\n"));
    }

    /// One processed file: status icon, source, and destination or message
    pub fn print_result(status_icon: &str, status_color: Color, source: &str, dest_or_msg: &str) {
        let icon_styled = style(status_icon).with(status_color).bold();
        let source_styled = style(source).italic();
        let msg_styled = style(dest_or_msg).with(CliTheme::HINT);

        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(icon_styled));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(source_styled));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(msg_styled));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }

    /// Redraw the single progress line: `[####----] 42% (21/50) path`
    ///
    /// Does nothing when stdout is not a terminal.
    pub fn print_progress(done: usize, total: usize, path: &Path) {
        let mut out = stdout();
        if !out.is_terminal() {
            return;
        }

        let ratio = if total == 0 { 1.0 } else { done as f64 / total as f64 };
        let filled = ((ratio * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
        let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));

        let _ = out.queue(cursor::MoveToColumn(0));
        let _ = out.queue(Clear(ClearType::CurrentLine));
        let _ = out.queue(Print(style(format!("[{}]", bar)).with(CliTheme::ACCENT)));
        let _ = out.queue(Print(format!(
            " {:>3}% ({}/{}) {}",
            (ratio * 100.0) as u32,
            done,
            total,
            path.display()
        )));
        let _ = out.flush();
    }

    /// Leave the progress line behind
    pub fn finish_progress() {
        let mut out = stdout();
        if out.is_terminal() {
            let _ = out.execute(Print("\n"));
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.sample_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let exe_dir = get_executable_dir()?;
    let config = load_config(&cli, &exe_dir)?;

    let _guard = setup_logging(&cli, &config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "photo-merge starting");
    if let Some(name) = cli.config_name() {
        info!(config = %name, "Using configuration");
    }
    if config.verbose {
        info!(?config, "Configuration loaded");
    }

    match run(&config) {
        Ok(stats) => {
            print_summary(&stats, &config);
            Ok(())
        }
        Err(e) => {
            use cli_output::*;

            cli_output::finish_progress();
            error!(error = %e, "Merge failed");
            print_separator();
            print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

/// Index the target, merge the source into it and persist the index
fn run(config: &Config) -> Result<RunStatistics> {
    config.validate()?;

    let filter = MediaFilter::new(config.normalized_extensions());
    let extractor = MediaTimestampExtractor::new();
    let hasher = XxHasher::new();

    let mut store = load_or_build_index(config, &filter, &extractor)?;

    info!(
        source = %config.source_dir.display(),
        target = %config.target_dir.display(),
        "Merging"
    );

    let verbose = config.verbose;
    let mut engine = MergeEngine::new(filter, &extractor, &hasher, config.operation)
        .with_hash_cache(config.cache_hashes);
    let stats = engine.merge_with_progress(&mut store, &config.source_dir, &config.target_dir, &mut |p| {
        if verbose {
            print_outcome(p.path, p.outcome);
        } else {
            cli_output::print_progress(p.done, p.total, p.path);
        }
    })?;
    cli_output::finish_progress();

    if let Some(snapshot) = &config.index_snapshot {
        store
            .save(snapshot)
            .with_context(|| format!("saving index snapshot {}", snapshot.display()))?;
    }

    Ok(stats)
}

/// Reuse the snapshot when there is one, otherwise walk the target
fn load_or_build_index(
    config: &Config,
    filter: &MediaFilter,
    extractor: &MediaTimestampExtractor,
) -> Result<IndexStore> {
    if let Some(snapshot) = config.index_snapshot.as_deref()
        && snapshot.exists()
    {
        info!(snapshot = %snapshot.display(), "Loading index from snapshot");
        let store = IndexStore::load(snapshot)?;

        if config.verify_index {
            let stale = store.stale_paths();
            if !stale.is_empty() {
                for path in &stale {
                    warn!(?path, "Indexed file is missing");
                }
                let msg = format!(
                    "{} of {} indexed files no longer exist; delete {} to re-index",
                    stale.len(),
                    store.file_count(),
                    snapshot.display()
                );
                warn!("{}", msg);
                cli_output::print_warning(&msg);
            }
        }
        return Ok(store);
    }

    info!(target = %config.target_dir.display(), "Indexing target");
    let store = IndexStore::build_with_progress(&config.target_dir, filter, extractor, &mut |done, total, path| {
        cli_output::print_progress(done, total, path);
    });
    cli_output::finish_progress();
    Ok(store)
}

fn print_outcome(path: &Path, outcome: &FileOutcome) {
    use cli_output::*;

    let source = path.display().to_string();
    match outcome {
        FileOutcome::Directory => {}
        FileOutcome::SkippedExtension => print_result("⊘", CliTheme::HINT, &source, "skipped by extension"),
        FileOutcome::Duplicate { existing } => print_result(
            "≡",
            CliTheme::ACCENT,
            &source,
            &format!("duplicate of {}", existing.display()),
        ),
        FileOutcome::Imported { destination, .. } => print_result(
            "✓",
            CliTheme::SUCCESS,
            &source,
            &format!("→ {}", destination.display()),
        ),
        FileOutcome::Failed { message } => print_result("✗", CliTheme::ERROR, &source, message),
    }
}

fn print_summary(stats: &RunStatistics, config: &Config) {
    use cli_output::*;

    print_separator();
    print_title("Merge complete");
    print_separator();

    print_blank();
    print_stat("Total entries", &stats.total.to_string(), CliTheme::ACCENT);
    print_stat("Directories", &stats.directories.to_string(), CliTheme::HINT);
    print_stat("Skipped by extension", &stats.skipped_extension.to_string(), CliTheme::WARNING);
    print_stat("Duplicates", &stats.duplicates.to_string(), CliTheme::ACCENT);
    print_stat("New files", &stats.new_files.to_string(), CliTheme::SUCCESS);
    print_stat("Failed", &stats.failed.to_string(), CliTheme::ERROR);
    print_blank();

    if stats.failed > 0 {
        print_warning("Some files were skipped because of errors, see the log for details");
    }
    if let Some(log_file) = &config.log_file {
        print_hint(&format!("Log file: {}", log_file.display()));
    }

    info!(stats = ?stats, "{}", stats.summary());
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Resolve config path - supports shorthand syntax
///
/// `-C sdcard` finds `sdcard`, `sdcard.toml`, or `<exe dir>/Config/sdcard.toml`.
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    let config_path = paths::expand_home(config_path);
    if config_path.exists() {
        return config_path;
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.clone()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path
}

/// Load configuration from file or CLI arguments, with resolved paths
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let mut config = if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(exe_dir, config_path);
        let file_config = Config::load_from_file(&resolved_path)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };

    if config.source_dir.as_os_str().is_empty() {
        anyhow::bail!("No source directory given (use --source or source_dir in the config file)");
    }
    if config.target_dir.as_os_str().is_empty() {
        anyhow::bail!("No target directory given (use --target or target_dir in the config file)");
    }

    config.source_dir = paths::resolve(&config.source_dir);
    config.target_dir = paths::resolve(&config.target_dir);
    config.index_snapshot = config.index_snapshot.as_deref().map(paths::resolve);
    config.log_file = config.log_file.as_deref().map(paths::resolve);

    Ok(config)
}

/// Console layer on stderr, plus a debug-level file layer when a log file is set
fn setup_logging(cli: &Cli, config: &Config) -> Result<Option<WorkerGuard>> {
    let level = if config.verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let mut guard = None;
    let file_layer: Option<Box<dyn Layer<Registry> + Send + Sync>> = match &config.log_file {
        Some(log_path) => {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(log_path)
                .with_context(|| format!("opening log file {}", log_path.display()))?;

            let (non_blocking, file_guard) = tracing_appender::non_blocking(file);
            guard = Some(file_guard);

            let layer = if cli.json_log {
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .with_filter(LevelFilter::DEBUG)
                    .boxed()
            } else {
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .with_filter(LevelFilter::DEBUG)
                    .boxed()
            };
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(env_filter))
        .init();

    Ok(guard)
}
