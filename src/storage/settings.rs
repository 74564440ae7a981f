//! Settings storage
//!
//! Manages persistence of user preferences and backend connection settings.

use crate::storage::{get_data_dir, StorageError};
use crate::types::config::{API_URL_ENV, DEFAULT_API_URL, DEFAULT_HISTORY_LIMIT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Backend base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Ask for streamed answers by default
    #[serde(default = "default_use_streaming")]
    pub use_streaming: bool,
    /// Number of prior messages sent as history (0 = none)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Timeout for single-shot requests, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Seconds without stream data before a warning is logged
    #[serde(default = "default_stall_warning_secs")]
    pub stall_warning_secs: u64,
    /// Connection attempts for the streaming endpoint
    #[serde(default = "default_stream_max_attempts")]
    pub stream_max_attempts: u32,
}

fn default_api_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_use_streaming() -> bool {
    true
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_stall_warning_secs() -> u64 {
    10
}

fn default_stream_max_attempts() -> u32 {
    3
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            use_streaming: default_use_streaming(),
            history_limit: default_history_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            stall_warning_secs: default_stall_warning_secs(),
            stream_max_attempts: default_stream_max_attempts(),
        }
    }
}

impl AppSettings {
    /// Validate settings values
    ///
    /// Ensures all parameters are within acceptable ranges.
    pub fn validate(&mut self) {
        if self.api_base_url.trim().is_empty() {
            self.api_base_url = default_api_base_url();
        }
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();

        self.history_limit = self.history_limit.min(200);
        self.request_timeout_secs = self.request_timeout_secs.clamp(1, 600);
        self.stall_warning_secs = self.stall_warning_secs.clamp(1, 300);
        self.stream_max_attempts = self.stream_max_attempts.clamp(1, 10);
    }

    /// Apply environment overrides on top of the stored values
    pub fn apply_env(&mut self) {
        self.apply_api_url_override(std::env::var(API_URL_ENV).ok());
    }

    fn apply_api_url_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            tracing::info!("Using backend URL from {}: {}", API_URL_ENV, url);
            self.api_base_url = url;
        }
    }
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file doesn't exist or is corrupted.
/// Environment overrides are always applied.
pub fn load_settings() -> AppSettings {
    let mut settings = match get_settings_path().and_then(|path| load_settings_from(&path)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            AppSettings::default()
        }
    };

    settings.apply_env();
    settings.validate();
    settings
}

/// Load and validate settings from a specific file
pub fn load_settings_from(path: &Path) -> Result<AppSettings, StorageError> {
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Ok(AppSettings::default());
    }

    let json = fs::read_to_string(path)?;
    let mut settings: AppSettings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Save settings to the default location
pub fn save_settings(settings: &AppSettings) -> Result<(), StorageError> {
    save_settings_to(settings, &get_settings_path()?)
}

pub fn save_settings_to(settings: &AppSettings, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to {}", path.display());
    Ok(())
}
