//! Core data types for the paperdrop engine.
//!
//! This module defines the folder configuration consumed by the watch engine,
//! the result record produced for every rename attempt, and the typed event
//! stream (`EngineEvent`) the engine emits to its caller. All types serialize
//! to camelCase JSON.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Per-folder watch settings.
///
/// Identity is the `path`; the engine treats the configuration as read-only
/// once watching has started. Created and edited by the configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderConfig {
    /// Directory to watch for incoming PDF files.
    pub path: PathBuf,

    /// Whether this folder participates in watching.
    pub enabled: bool,

    /// Append the current date (`_YYYYMMDD`) to generated names.
    pub include_date: bool,

    /// Ask the classifier to append a company or person name when present.
    pub include_names: bool,

    /// Extra instruction appended verbatim to the classification prompt.
    #[serde(default)]
    pub custom_prompt: String,
}

impl FolderConfig {
    /// Creates an enabled folder configuration with all extras off.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            include_date: false,
            include_names: false,
            custom_prompt: String::new(),
        }
    }
}

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warning,
}

/// A user-facing log line emitted by the engine.
///
/// This is the product log (start/stop notices, retry waits, per-file
/// outcomes), distinct from the `tracing` diagnostics. Retention belongs to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// When the entry was emitted, in local time.
    pub timestamp: DateTime<Local>,

    /// Human-readable message.
    pub message: String,

    /// Severity.
    pub level: LogLevel,
}

/// Terminal record of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResult {
    /// Path the trigger fired for.
    pub original_path: PathBuf,

    /// Path the file was renamed to, if the rename succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<PathBuf>,

    /// The sanitized document name the rename was attempted with.
    pub document_type: String,

    /// Whether the rename was applied.
    pub success: bool,

    /// Failure description when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenameResult {
    /// Creates a success record.
    #[must_use]
    pub fn success(original_path: &Path, new_path: PathBuf, document_type: impl Into<String>) -> Self {
        Self {
            original_path: original_path.to_path_buf(),
            new_path: Some(new_path),
            document_type: document_type.into(),
            success: true,
            error: None,
        }
    }

    /// Creates a failure record carrying the error description.
    #[must_use]
    pub fn failure(
        original_path: &Path,
        document_type: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            original_path: original_path.to_path_buf(),
            new_path: None,
            document_type: document_type.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Events emitted by the watch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A user-facing log entry.
    Log(LogEntry),

    /// A pipeline run completed, successfully or not.
    Renamed(RenameResult),
}

/// Sending half of the engine's event stream.
///
/// Send failures are swallowed: once the receiver is gone (the caller shut
/// down), late pipeline tasks must still run to completion without erroring.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl EventSink {
    /// Wraps a channel sender.
    #[must_use]
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }

    /// Emits a log entry stamped with the current local time.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            message: message.into(),
            level,
        };
        if self.tx.send(EngineEvent::Log(entry)).await.is_err() {
            trace!("event channel closed, dropping log entry");
        }
    }

    /// Emits a rename result.
    pub async fn renamed(&self, result: RenameResult) {
        if self.tx.send(EngineEvent::Renamed(result)).await.is_err() {
            trace!("event channel closed, dropping rename result");
        }
    }
}
