//! Configuration types.
//!
//! Configuration lives in `config.toml` under the platform config directory.
//! Every field has a default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Runtime configuration loaded from config.toml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Query execution settings
    #[serde(default)]
    pub query: QueryConfig,

    /// Result grid geometry
    #[serde(default)]
    pub grid: GridConfig,

    /// Appearance settings
    #[serde(default)]
    pub appearance: AppearanceConfig,

    /// User key bindings, applied after the defaults
    #[serde(default)]
    pub keymap: Vec<KeyBindingConfig>,
}

impl AppConfig {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e.to_string())),
        }
    }

    /// Parse TOML text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Query execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Rows requested per page.
    pub page_size: usize,

    /// Per-request engine timeout in seconds.
    pub timeout_secs: u64,

    /// Database path, or ":memory:".
    pub database: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            timeout_secs: 30,
            database: ":memory:".to_string(),
        }
    }
}

/// Result grid geometry, in logical pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Fixed row height.
    pub row_height: f32,

    /// Rows rendered beyond each viewport edge.
    pub overscan: usize,

    /// Initial width of every data column.
    pub default_column_width: f32,

    /// Narrowest width a drag may produce.
    pub min_column_width: f32,

    /// Width of the pinned row-number column.
    pub index_column_width: f32,

    /// Distance from the loaded end, in rows, that triggers loading more.
    pub load_more_threshold: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            row_height: 40.0,
            overscan: 8,
            default_column_width: 160.0,
            min_column_width: 48.0,
            index_column_width: 40.0,
            load_more_threshold: 20,
        }
    }
}

/// Appearance configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppearanceConfig {
    /// Theme mode: "light", "dark", or "system"
    #[serde(default)]
    pub theme: ThemeMode,
}

/// Theme mode selection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

/// A user key binding, e.g. `{ key = "cmd+enter", action = "toggle_run" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindingConfig {
    /// Keystroke, `+` or `-` separated.
    pub key: String,

    /// Action name, e.g. "format_query".
    pub action: String,

    /// Key context the binding applies in.
    #[serde(default)]
    pub context: Option<String>,
}

/// Get the config directory path.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("quarry"))
}

/// Get the path to config.toml.
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

/// Get the data directory path (history database).
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("quarry"))
}

/// Ensure the data directory exists.
pub fn ensure_data_dir() -> std::io::Result<Option<PathBuf>> {
    match data_dir() {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            Ok(Some(dir))
        }
        None => Ok(None),
    }
}
