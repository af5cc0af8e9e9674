//! Configuration for the tweak engine.
//!
//! Layered the usual way:
//! - Default values
//! - TOML file (`.tweakwatch/settings.toml`, searched upward from the
//!   current directory)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables are prefixed with `TWEAK_` and use double
//! underscores to separate nested levels:
//! - `TWEAK_CAPACITY=4096` sets `capacity`
//! - `TWEAK_DEBOUNCE_MS=200` sets `debounce_ms`
//! - `TWEAK_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::extract::MarkerScanner;
use crate::registry::DEFAULT_CAPACITY;

/// Directory holding the settings file.
pub const CONFIG_DIR: &str = ".tweakwatch";
/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Maximum number of registered tweaks
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Token that starts a tweak declaration in source files
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Quiet period before a changed file is re-read
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_marker() -> String {
    MarkerScanner::DEFAULT_MARKER.to_string()
}
fn default_debounce_ms() -> u64 {
    50
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            capacity: default_capacity(),
            marker: default_marker(),
            debounce_ms: default_debounce_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore becomes a dot; single underscores stay in field names
            .merge(Env::prefixed("TWEAK_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find `.tweakwatch/settings.toml` from the current directory upward.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Render as TOML for display.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.capacity, 1024);
        assert_eq!(settings.marker, "TWEAK");
        assert_eq!(settings.debounce_ms, 50);
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
capacity = 16
marker = "LIVE"
debounce_ms = 5

[logging]
default = "info"

[logging.modules]
watcher = "trace"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.capacity, 16);
        assert_eq!(settings.marker, "LIVE");
        assert_eq!(settings.debounce_ms, 5);
        assert_eq!(settings.logging.default, "info");
        assert_eq!(settings.logging.modules["watcher"], "trace");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "debounce_ms = 250\n").unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.debounce_ms, 250);
        assert_eq!(settings.capacity, 1024);
        assert_eq!(settings.marker, "TWEAK");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_DIR).join(CONFIG_FILE);

        let settings = Settings {
            capacity: 8,
            marker: "KNOB".to_string(),
            ..Settings::default()
        };
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.capacity, 8);
        assert_eq!(loaded.marker, "KNOB");
    }
}
