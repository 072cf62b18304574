//! Paperdrop - watched-folder PDF auto-renamer.
//!
//! This binary wires the settings file, the Claude classification client,
//! and the watch engine together.
//!
//! # Commands
//!
//! - `paperdrop init`: Write a default configuration file
//! - `paperdrop test-connection`: Verify the configured API key
//! - `paperdrop run`: Watch the configured folders and rename incoming PDFs

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use paperdrop_engine::classify::{Classifier, ClaudeClient};
use paperdrop_engine::config::{self, AppConfig};
use paperdrop_engine::types::{EngineEvent, LogLevel};
use paperdrop_engine::watcher::{EngineConfig, WatchEngine};

/// Capacity of the engine event channel consumed by `run`.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Paperdrop - watched-folder PDF auto-renamer.
///
/// Watches configured folders for incoming PDF files, classifies each
/// document with the Claude API, and renames the file in place.
#[derive(Parser, Debug)]
#[command(name = "paperdrop")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
EXAMPLES:
    # Write a default configuration file, then add your API key and folders
    paperdrop init

    # Verify the configured API key
    paperdrop test-connection

    # Start watching
    paperdrop run
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file.
    ///
    /// Creates `config.json` in the platform config directory. Edit it to
    /// set the API key and the folders to watch.
    Init {
        /// Overwrite an existing configuration without confirmation.
        #[arg(short, long)]
        force: bool,
    },

    /// Verify the configured API key against the classification service.
    TestConnection,

    /// Watch the configured folders and rename incoming PDFs.
    Run,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Init { force } => run_init(force),
        Command::TestConnection => build_runtime()?.block_on(run_test_connection()),
        Command::Run => build_runtime()?.block_on(run_watch()),
    }
}

/// Builds the async runtime for the networked commands.
fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

/// Writes a default configuration file.
fn run_init(force: bool) -> Result<()> {
    let path = config::config_path()?;

    if path.exists() && !force {
        eprintln!("Configuration already exists at: {}", path.display());
        eprint!("Overwrite it? [y/N] ");
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    AppConfig::default().save_to(&path)?;

    println!("Wrote default configuration to: {}", path.display());
    println!("Set `apiKey` and add entries to `watchFolders`, then run `paperdrop run`.");
    Ok(())
}

/// Checks the configured API key against the service.
async fn run_test_connection() -> Result<()> {
    let config = AppConfig::load()?;
    if config.api_key.is_empty() {
        bail!(
            "API key not configured; run `paperdrop init` and edit {}",
            config::config_path()?.display()
        );
    }

    let client = ClaudeClient::new(config.api_key, config.model.clone());
    client
        .test_connection()
        .await
        .context("connection check failed")?;

    println!("Connection OK (model: {})", config.model);
    Ok(())
}

/// Runs the watch engine until interrupted.
async fn run_watch() -> Result<()> {
    let config = AppConfig::load()?;
    if config.api_key.is_empty() {
        bail!(
            "API key not configured; run `paperdrop init` and edit {}",
            config::config_path()?.display()
        );
    }
    if !config.watch_folders.iter().any(|f| f.enabled) {
        warn!("no enabled watch folders configured");
    }

    let classifier = Arc::new(ClaudeClient::new(config.api_key.clone(), config.model.clone()));
    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let engine = WatchEngine::new(
        classifier,
        tx,
        EngineConfig {
            max_filename_length: config.clamped_max_filename_length(),
            ..EngineConfig::default()
        },
    );

    let started = engine.start(&config.watch_folders).await;
    info!(folders = started, "watching for incoming PDFs");

    let mut renamed: u64 = 0;
    let mut failed: u64 = 0;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutting down");
                engine.stop().await;
                break;
            }
            event = rx.recv() => match event {
                Some(EngineEvent::Log(entry)) => {
                    println!(
                        "[{}] {:<7} {}",
                        entry.timestamp.format("%H:%M:%S"),
                        level_tag(entry.level),
                        entry.message
                    );
                }
                Some(EngineEvent::Renamed(result)) => {
                    if result.success {
                        renamed += 1;
                    } else {
                        failed += 1;
                    }
                }
                None => break,
            },
        }
    }

    println!("{renamed} file(s) renamed, {failed} failure(s)");
    Ok(())
}

/// Short tag printed before each log message.
fn level_tag(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Success => "SUCCESS",
        LogLevel::Error => "ERROR",
        LogLevel::Warning => "WARNING",
    }
}
