//! Application settings.
//!
//! Settings live in a camelCase JSON document at
//! `<platform-config-dir>/paperdrop/config.json` (for example
//! `~/.config/paperdrop/config.json` on Linux or
//! `~/Library/Application Support/paperdrop/config.json` on macOS). A missing
//! file loads as defaults; unknown or absent fields fall back field by field,
//! so configs written by older versions keep working.

use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sanitize::{MAX_STEM_LEN, MIN_STEM_LEN};
use crate::types::FolderConfig;

/// Model used when the config does not name one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default bound for generated filename stems, in characters.
pub const DEFAULT_MAX_FILENAME_LENGTH: usize = 40;

/// Directory under the platform config dir.
const CONFIG_DIR_NAME: &str = "paperdrop";

/// Settings file name.
const CONFIG_FILE_NAME: &str = "config.json";

/// Errors that can occur loading or saving settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine the platform configuration directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// API key for the classification service.
    pub api_key: String,

    /// Model identifier sent with every classification request.
    pub model: String,

    /// Folders to watch.
    pub watch_folders: Vec<FolderConfig>,

    /// Maximum length of generated filename stems, in characters.
    /// Clamped to [20, 80] when applied.
    pub max_filename_length: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            watch_folders: Vec::new(),
            max_filename_length: DEFAULT_MAX_FILENAME_LENGTH,
        }
    }
}

impl AppConfig {
    /// Loads settings from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform config dir cannot be determined, the
    /// file cannot be read (other than not existing), or it is invalid JSON.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path()?)
    }

    /// Loads settings from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Saves settings to the default location, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_path()?)
    }

    /// Saves settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// The configured stem bound, clamped to the supported range.
    #[must_use]
    pub fn clamped_max_filename_length(&self) -> usize {
        self.max_filename_length.clamp(MIN_STEM_LEN, MAX_STEM_LEN)
    }
}

/// Path of the settings file in the platform config directory.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] when the home directory cannot be
/// resolved.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(base_dirs
        .config_dir()
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_filename_length, DEFAULT_MAX_FILENAME_LENGTH);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AppConfig {
            api_key: "sk-test".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            watch_folders: vec![FolderConfig {
                include_date: true,
                custom_prompt: "領収書は店名も付けて".to_string(),
                ..FolderConfig::new("/scans/inbox")
            }],
            max_filename_length: 60,
        };

        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "apiKey": "sk-partial" }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.api_key, "sk-partial");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(config.watch_folders.is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let json = serde_json::to_value(AppConfig::default()).unwrap();
        assert!(json.get("apiKey").is_some());
        assert!(json.get("watchFolders").is_some());
        assert!(json.get("maxFilenameLength").is_some());
    }

    #[test]
    fn max_filename_length_is_clamped() {
        let low = AppConfig {
            max_filename_length: 5,
            ..AppConfig::default()
        };
        assert_eq!(low.clamped_max_filename_length(), 20);

        let high = AppConfig {
            max_filename_length: 500,
            ..AppConfig::default()
        };
        assert_eq!(high.clamped_max_filename_length(), 80);
    }
}
