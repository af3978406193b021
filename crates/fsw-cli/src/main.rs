//! CLI entry point for the fsw file watcher.
//!
//! This binary watches a directory tree through FSEvents and prints every
//! change notification until interrupted.
//!
//! # Usage
//!
//! ```bash
//! fsw-watch [OPTIONS] [PATH]
//!
//! # Watch the current directory
//! fsw-watch
//!
//! # Watch a tree, one JSON object per line
//! fsw-watch --format json /path/to/project
//!
//! # Load settings from a config file
//! FSW_CONFIG=fsw.json fsw-watch /path/to/project
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, ValueEnum};
use fsw_core::Config;
use fsw_fsevents::{EventStats, WatchItem};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Watch a directory tree and print file system changes.
#[derive(Parser)]
#[command(name = "fsw-watch", version, about, long_about = None)]
struct Cli {
    /// Directory to watch.
    #[arg(env = "FSW_PATH", default_value = ".")]
    path: Utf8PathBuf,

    /// JSON configuration file.
    #[arg(short, long, env = "FSW_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Only report direct children of the watched directory.
    #[arg(long)]
    non_recursive: bool,

    /// Event channel capacity (overrides the config file).
    #[arg(long)]
    capacity: Option<usize>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

/// Event output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One human-readable line per event.
    Text,
    /// One JSON object per line.
    Json,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(level)
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the config file (if any) and CLI overrides.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded, the watch path is
/// not a directory, or the resulting configuration is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if cli.non_recursive {
        config.watch.recursive = false;
    }
    if let Some(capacity) = cli.capacity {
        config.watch.channel_capacity = capacity;
    }
    config.watch.validate()?;

    validate_dir(&cli.path)?;
    Ok(config)
}

fn validate_dir(path: &Utf8Path) -> color_eyre::Result<()> {
    if !path.exists() {
        return Err(color_eyre::eyre::eyre!("Path does not exist: {path}"));
    }
    if !path.is_dir() {
        return Err(color_eyre::eyre::eyre!("Path is not a directory: {path}"));
    }
    Ok(())
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Watches `path` until Ctrl-C (or SIGTERM) and prints every item.
///
/// # Errors
///
/// Returns an error if the watcher cannot be started or output fails.
#[cfg(target_os = "macos")]
async fn run_watch(path: &Utf8Path, config: &Config, format: OutputFormat) -> color_eyre::Result<()> {
    use fsw_fsevents::FsWatcher;
    use tokio::signal::unix::{SignalKind, signal};

    let mut watcher = FsWatcher::new(path, &config.watch).await?;
    tracing::info!(
        path = %watcher.watch_path(),
        recursive = config.watch.recursive,
        "Watching for changes"
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut stats = EventStats::default();

    loop {
        tokio::select! {
            item = watcher.recv() => {
                let Some(item) = item else { break };
                stats.record(&item);
                let line = format_item(&item, format)?;
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                writeln!(handle, "{line}")?;
                if let Err(error) = &item {
                    if error.is_fatal() {
                        tracing::error!(error = %error, "Watcher stopped");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    watcher.shutdown();
    print_stats_summary(&stats);
    Ok(())
}

/// FSEvents exists only on macOS.
#[cfg(not(target_os = "macos"))]
#[allow(clippy::unused_async)]
async fn run_watch(path: &Utf8Path, _config: &Config, _format: OutputFormat) -> color_eyre::Result<()> {
    Err(color_eyre::eyre::eyre!(
        "Cannot watch {path}: the FSEvents backend is only available on macOS"
    ))
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Renders one channel item as a single output line.
fn format_item(item: &WatchItem, format: OutputFormat) -> color_eyre::Result<String> {
    match (format, item) {
        (OutputFormat::Text, Ok(event)) => Ok(event.to_string()),
        (OutputFormat::Text, Err(error)) => Ok(format!("error: {error}")),
        (OutputFormat::Json, Ok(event)) => Ok(serde_json::to_string(event)?),
        (OutputFormat::Json, Err(error)) => Ok(serde_json::json!({
            "kind": "error",
            "message": error.to_string(),
            "code": error.code(),
            "recoverable": error.is_recoverable(),
        })
        .to_string()),
    }
}

/// Prints a summary of delivered notifications to stderr.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn print_stats_summary(stats: &EventStats) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();

    let _ = writeln!(handle);
    let _ = writeln!(handle, "Watch Summary");
    let _ = writeln!(handle, "=============");
    let _ = writeln!(handle, "Total events: {}", stats.total_events());
    let _ = writeln!(handle, "  Changed:    {}", stats.changed);
    let _ = writeln!(handle, "  Created:    {}", stats.created);
    let _ = writeln!(handle, "  Deleted:    {}", stats.deleted);
    let _ = writeln!(handle, "  Renamed:    {}", stats.renamed);
    let _ = writeln!(handle, "Overflows:    {}", stats.overflows);
    let _ = writeln!(handle, "Errors:       {}", stats.errors);
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Build and validate configuration, then watch
    let config = build_config(&cli)?;
    run_watch(&cli.path, &config, cli.format).await
}
