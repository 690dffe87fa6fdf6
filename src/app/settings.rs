use crate::shared::paths::{ensure_dir, get_settings_path};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_STORAGE_KEY: &str = "advanced-todo-tasks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Name of the single slot holding the task document.
    pub storage_key: String,
    /// Filter directive used when `RUST_LOG` is not set.
    pub log_level: String,
    pub pretty_json: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_level: "info".to_string(),
            pretty_json: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid setting: {0}")]
    InvalidValue(String),
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let key = self.storage_key.trim();
        if key.is_empty() {
            return Err(SettingsError::InvalidValue(
                "storageKey cannot be empty".to_string(),
            ));
        }
        if key.contains('/') || key.contains('\\') || key == "." || key == ".." {
            return Err(SettingsError::InvalidValue(format!(
                "storageKey must be a plain name: {}",
                self.storage_key
            )));
        }
        Ok(())
    }

    /// Path of the task document inside `storage_dir`.
    pub fn document_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(format!("{}.json", self.storage_key.trim()))
    }
}

/// Load settings from disk, returning defaults if the file doesn't exist or is invalid
pub fn load_settings() -> AppSettings {
    load_settings_from(&get_settings_path())
}

pub fn load_settings_from(path: &Path) -> AppSettings {
    if !path.exists() {
        tracing::info!(target: "system", "Settings file not found, using defaults");
        return AppSettings::default();
    }

    match load_settings_from_file(path) {
        Ok(settings) => {
            tracing::info!(target: "system", "Settings loaded from {:?}", path);
            settings
        }
        Err(e) => {
            tracing::warn!(target: "system", "Failed to load settings: {}, using defaults", e);
            AppSettings::default()
        }
    }
}

fn load_settings_from_file(path: &Path) -> Result<AppSettings, SettingsError> {
    let contents = std::fs::read_to_string(path)?;
    let settings: AppSettings = serde_json::from_str(&contents)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings_to(settings: &AppSettings, path: &Path) -> Result<(), SettingsError> {
    settings.validate()?;

    if let Some(dir) = path.parent() {
        ensure_dir(dir)?;
    }

    let contents = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, contents)?;

    tracing::info!(target: "system", "Settings saved to {:?}", path);
    Ok(())
}
