//! Paperdrop - watched-folder PDF auto-renamer.
//!
//! This crate watches designated folders for newly arrived PDF files, asks a
//! language-model API to classify each document, and renames the file in
//! place based on the answer.
//!
//! # Overview
//!
//! The [`watcher::WatchEngine`] owns one recursive filesystem subscription
//! per enabled folder. Each qualifying create/modify event is deduplicated
//! per path and, after a quiescence delay, runs a pipeline: the
//! [`readiness`] probe waits for the file to settle, the [`classify`]
//! gateway asks for a name, [`sanitize`] turns the answer into a legal
//! bounded filename stem, and [`rename`] applies it with collision-avoiding
//! suffixes. Results and user-facing log entries flow back to the caller
//! over a channel of [`types::EngineEvent`]s.
//!
//! # Modules
//!
//! - [`types`]: folder configuration, rename results, and the event stream
//! - [`watcher`]: folder subscriptions, debounce, and pipeline orchestration
//! - [`readiness`]: file settledness probing
//! - [`classify`]: the classification service boundary and the Claude client
//! - [`sanitize`]: filename sanitation and truncation
//! - [`rename`]: collision-safe renaming
//! - [`config`]: settings persistence
//! - [`error`]: error types for engine operations

pub mod classify;
pub mod config;
pub mod error;
pub mod readiness;
pub mod rename;
pub mod sanitize;
pub mod types;
pub mod watcher;

pub use classify::{Classifier, ClassifyError, ClaudeClient};
pub use config::{AppConfig, ConfigError};
pub use error::{EngineError, Result};
pub use readiness::{ProbeConfig, ReadyState};
pub use types::{EngineEvent, EventSink, FolderConfig, LogEntry, LogLevel, RenameResult};
pub use watcher::{EngineConfig, WatchEngine};
