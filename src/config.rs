use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const APP_NAME: &str = "chatroom";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoredSession {
    pub homeserver: String,
    pub user_id: String,
    pub access_token: String,
    pub device_id: String,
}

/// Server-side message policy. Read-only to the controllers and passed
/// into every menu invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub allow_editing: bool,
    /// Minutes after which non-privileged users can no longer edit. `None` or 0 = no limit.
    pub block_edit_in_minutes: Option<u32>,
    pub allow_deleting: bool,
    pub block_delete_in_minutes: Option<u32>,
    pub allow_starring: bool,
    pub allow_pinning: bool,
    pub read_receipt_store_users: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            allow_editing: true,
            block_edit_in_minutes: None,
            allow_deleting: true,
            block_delete_in_minutes: None,
            allow_starring: true,
            allow_pinning: true,
            read_receipt_store_users: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineSettings {
    /// Store-change coalescing window.
    pub debounce_ms: u64,
    /// Show the "loading" banner if the initial load takes longer than this.
    pub stale_after_ms: u64,
    /// Rows rendered before the first store notification arrives.
    pub initial_window: usize,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            stale_after_ms: 1000,
            initial_window: 10,
        }
    }
}

impl TimelineSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub timeline: TimelineSettings,
}

pub fn config_dir() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_NAME)
}

pub fn data_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_NAME)
}

pub fn session_path() -> PathBuf {
    config_dir().join("session.json")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(io_err)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&data)?)
}

pub fn save_session(session: &StoredSession) -> Result<(), ConfigError> {
    write_json(&session_path(), session)
}

pub fn load_session() -> Result<StoredSession, ConfigError> {
    let path = session_path();
    if !path.exists() {
        return Err(ConfigError::NoSession);
    }
    read_json(&path)
}

pub fn load_settings() -> AppSettings {
    load_settings_from(&settings_path())
}

/// Missing or malformed files yield the defaults.
pub fn load_settings_from(path: &Path) -> AppSettings {
    if !path.exists() {
        return AppSettings::default();
    }
    match read_json(path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Ignoring settings file {}: {e}", path.display());
            AppSettings::default()
        }
    }
}
