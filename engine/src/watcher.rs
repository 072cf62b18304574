//! Watch coordinator: folder subscriptions, debounce, and the rename pipeline.
//!
//! [`WatchEngine`] owns one recursive filesystem subscription per enabled
//! folder. The notify callback is kept lightweight (filter + `try_send`); a
//! dispatch task owns trigger deduplication and schedules one pipeline task
//! per settled file. Pipelines for distinct paths run concurrently; the
//! processing set guarantees a path is never in two pipelines at once.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use paperdrop_engine::classify::ClaudeClient;
//! use paperdrop_engine::types::{EngineEvent, FolderConfig};
//! use paperdrop_engine::watcher::{EngineConfig, WatchEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let classifier = Arc::new(ClaudeClient::new("sk-...", "claude-sonnet-4-20250514"));
//!     let (tx, mut rx) = mpsc::channel(256);
//!     let engine = WatchEngine::new(classifier, tx, EngineConfig::default());
//!
//!     engine.start(&[FolderConfig::new("/scans/inbox")]).await;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             EngineEvent::Log(entry) => println!("{}", entry.message),
//!             EngineEvent::Renamed(result) => println!("{:?}", result.new_path),
//!         }
//!     }
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::classify::Classifier;
use crate::error::Result;
use crate::readiness::{self, ProbeConfig, ReadyState};
use crate::rename;
use crate::sanitize;
use crate::types::{EngineEvent, EventSink, FolderConfig, LogLevel, RenameResult};

/// Capacity of the channel between notify callbacks and the dispatch task.
const DISPATCH_CHANNEL_CAPACITY: usize = 1024;

/// Default wait after a create/modify event before the pipeline starts, so
/// slow writers (scanners) can finish.
const QUIESCENCE_DELAY_SECS: u64 = 3;

/// Tuning knobs for the watch engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum length of generated filename stems, in characters.
    pub max_filename_length: usize,

    /// Quiescence delay between a trigger and its pipeline run.
    pub quiescence_delay: Duration,

    /// Readiness probe timing.
    pub probe: ProbeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_filename_length: crate::config::DEFAULT_MAX_FILENAME_LENGTH,
            quiescence_delay: Duration::from_secs(QUIESCENCE_DELAY_SECS),
            probe: ProbeConfig::default(),
        }
    }
}

/// A queued trigger: the affected file and the folder it belongs to.
type Trigger = (PathBuf, FolderConfig);

/// Watches folders for incoming PDFs and renames them via classification.
///
/// Dropping the engine (or calling [`WatchEngine::stop`]) closes every
/// subscription. Pipelines already in flight run to completion and simply
/// drop their events if the receiver is gone.
pub struct WatchEngine {
    sink: EventSink,

    /// Feeds triggers from notify callbacks to the dispatch task.
    dispatch_tx: mpsc::Sender<Trigger>,

    /// One live subscription per watched folder, keyed by folder path.
    /// Dropping a watcher unsubscribes it.
    watchers: Mutex<HashMap<PathBuf, RecommendedWatcher>>,
}

impl WatchEngine {
    /// Creates an engine and spawns its dispatch task.
    ///
    /// Must be called from within a Tokio runtime. `events` receives the
    /// engine's log entries and rename results.
    #[must_use]
    pub fn new(
        classifier: Arc<dyn Classifier>,
        events: mpsc::Sender<EngineEvent>,
        config: EngineConfig,
    ) -> Self {
        let sink = EventSink::new(events);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);

        tokio::spawn(run_dispatch_loop(
            dispatch_rx,
            classifier,
            sink.clone(),
            config,
        ));

        Self {
            sink,
            dispatch_tx,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Starts watching the enabled folders, stopping any prior watch first.
    ///
    /// Each folder is verified to be a directory before subscribing; failures
    /// are logged per folder and do not abort the others. Returns the number
    /// of folders now being watched.
    pub async fn start(&self, folders: &[FolderConfig]) -> usize {
        self.stop().await;

        let mut started = 0;
        for folder in folders {
            if !folder.enabled {
                continue;
            }

            match fs::metadata(&folder.path) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    self.sink
                        .log(
                            LogLevel::Error,
                            format!("パスがフォルダではありません: {}", folder.path.display()),
                        )
                        .await;
                    continue;
                }
                Err(e) => {
                    self.sink
                        .log(
                            LogLevel::Error,
                            format!("監視開始失敗: {} - {e}", folder.path.display()),
                        )
                        .await;
                    continue;
                }
            }

            match watch_folder(folder.clone(), self.dispatch_tx.clone()) {
                Ok(watcher) => {
                    self.watchers
                        .lock()
                        .expect("watcher map lock poisoned")
                        .insert(folder.path.clone(), watcher);
                    self.sink
                        .log(
                            LogLevel::Success,
                            format!("監視開始: {}", folder.path.display()),
                        )
                        .await;
                    started += 1;
                }
                Err(e) => {
                    self.sink
                        .log(
                            LogLevel::Error,
                            format!("監視開始失敗: {} - {e}", folder.path.display()),
                        )
                        .await;
                }
            }
        }

        started
    }

    /// Stops watching every folder. Idempotent.
    pub async fn stop(&self) {
        let stopped: Vec<PathBuf> = {
            let mut guard = self.watchers.lock().expect("watcher map lock poisoned");
            guard.drain().map(|(path, _watcher)| path).collect()
            // Subscriptions close as the drained watchers drop.
        };

        for path in stopped {
            self.sink
                .log(LogLevel::Info, format!("監視停止: {}", path.display()))
                .await;
        }
    }

    /// Whether any folder is currently being watched.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        !self
            .watchers
            .lock()
            .expect("watcher map lock poisoned")
            .is_empty()
    }
}

/// Opens a recursive subscription for one folder.
fn watch_folder(
    folder: FolderConfig,
    dispatch_tx: mpsc::Sender<Trigger>,
) -> notify::Result<RecommendedWatcher> {
    let root = folder.path.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            handle_notify_event(res, &folder, &dispatch_tx);
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    debug!(folder = %root.display(), "started recursive watch");
    Ok(watcher)
}

/// Filters raw notify events down to PDF create/modify triggers.
///
/// Runs on the notify thread, so it only filters and `try_send`s; all I/O
/// happens in the pipeline tasks. Rename notifications are ignored so the
/// executor's own renames do not re-trigger the pipeline.
fn handle_notify_event(
    res: notify::Result<Event>,
    folder: &FolderConfig,
    dispatch_tx: &mpsc::Sender<Trigger>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(folder = %folder.path.display(), error = %e, "file watcher error");
            return;
        }
    };

    let qualifies = matches!(
        event.kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
    );
    if !qualifies {
        trace!(kind = ?event.kind, "ignoring event kind");
        return;
    }

    for path in &event.paths {
        if !has_pdf_extension(path) {
            continue;
        }
        if dispatch_tx.try_send((path.clone(), folder.clone())).is_err() {
            warn!(path = %path.display(), "failed to queue trigger, channel may be full");
        }
    }
}

/// Case-insensitive `.pdf` extension check.
fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Removes a path from the processing set when the pipeline task ends,
/// however it ends.
struct ProcessingGuard {
    set: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.set.lock() {
            guard.remove(&self.path);
        }
    }
}

/// Receives triggers, dedups them per path, and spawns pipeline tasks.
///
/// A path stays in the processing set from scheduling until its pipeline
/// finishes, so a burst of writes collapses into a single run and a second
/// burst arriving mid-processing is dropped.
async fn run_dispatch_loop(
    mut rx: mpsc::Receiver<Trigger>,
    classifier: Arc<dyn Classifier>,
    sink: EventSink,
    config: EngineConfig,
) {
    let processing: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));

    while let Some((path, folder)) = rx.recv().await {
        {
            let mut guard = processing.lock().expect("processing set lock poisoned");
            if !guard.insert(path.clone()) {
                trace!(path = %path.display(), "already scheduled, dropping trigger");
                continue;
            }
        }

        let release = ProcessingGuard {
            set: Arc::clone(&processing),
            path: path.clone(),
        };
        let classifier = Arc::clone(&classifier);
        let sink = sink.clone();
        let config = config.clone();

        tokio::spawn(async move {
            let _release = release;
            tokio::time::sleep(config.quiescence_delay).await;
            process_file(&path, &folder, classifier.as_ref(), &sink, &config).await;
        });
    }

    debug!("trigger dispatch loop shutting down");
}

/// Runs one pipeline and converts any error into a log entry plus a failure
/// result. Nothing escapes this boundary.
async fn process_file(
    path: &Path,
    folder: &FolderConfig,
    classifier: &dyn Classifier,
    sink: &EventSink,
    config: &EngineConfig,
) {
    let filename = display_name(path);

    if let Err(err) = run_pipeline(path, folder, classifier, sink, config, &filename).await {
        sink.log(LogLevel::Error, format!("❌ 処理エラー: {filename} - {err}"))
            .await;
        sink.renamed(RenameResult::failure(path, "", err.to_string()))
            .await;
    }
}

/// The per-file pipeline: readiness gate, classification, sanitation, rename.
async fn run_pipeline(
    path: &Path,
    folder: &FolderConfig,
    classifier: &dyn Classifier,
    sink: &EventSink,
    config: &EngineConfig,
    filename: &str,
) -> Result<()> {
    match readiness::probe(path, &config.probe, sink).await {
        ReadyState::Missing => {
            sink.log(
                LogLevel::Warning,
                format!("ファイルが見つかりません: {filename}"),
            )
            .await;
            return Ok(());
        }
        ReadyState::Busy => {
            sink.log(
                LogLevel::Warning,
                format!("ファイルが使用中です（スキップ）: {filename}"),
            )
            .await;
            return Ok(());
        }
        ReadyState::Ready => {}
    }

    sink.log(LogLevel::Info, format!("🔄 処理開始: {filename}"))
        .await;

    let suggestion = classifier.suggest_name(path, folder).await?;
    let stem = sanitize::truncate_stem(
        &sanitize::sanitize(&suggestion, folder),
        config.max_filename_length,
    );

    let result = rename::rename_with_suffix(path, &stem);
    if result.success {
        let new_name = result
            .new_path
            .as_deref()
            .map(display_name)
            .unwrap_or_default();
        sink.log(LogLevel::Success, format!("✅ {filename} → {new_name}"))
            .await;
    } else {
        sink.log(
            LogLevel::Error,
            format!(
                "❌ リネーム失敗: {filename} - {}",
                result.error.as_deref().unwrap_or("unknown")
            ),
        )
        .await;
    }
    sink.renamed(result).await;

    Ok(())
}

/// Final path component for log messages.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
