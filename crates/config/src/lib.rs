//! Configuration loading for feedsync applications
//!
//! Provides utilities for loading configuration files from the shared
//! feedsync config directory (~/.config/feedsync/) and for locating the
//! data directory that holds the story database and image cache.
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Directory name used under the platform config and data roots
const APP_DIR: &str = "feedsync";

/// Initialize the feedsync config directory.
///
/// Creates ~/.config/feedsync/ if it doesn't exist.
/// Call this once at application startup.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the feedsync config directory (~/.config/feedsync/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the feedsync config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Get the feedsync data directory (~/.local/share/feedsync/ on Linux)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(APP_DIR))
}

/// Ensure the data directory exists and return it
pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = data_dir().context("Could not determine data directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
    Ok(dir)
}

/// Load and parse a JSON config file from the feedsync config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a config file exists in the feedsync config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Ensure the feedsync config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Save a value as JSON to a config file in the feedsync config directory
pub fn save_json<T: serde::Serialize>(filename: &str, value: &T) -> Result<()> {
    let dir = ensure_config_dir()?;
    save_json_file(&dir.join(filename), value)
}

/// Save a value as pretty JSON to an arbitrary path
pub fn save_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("feedsync"));
    }

    #[test]
    fn test_config_path() {
        let path = config_path("settings.json");
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.ends_with("feedsync/settings.json"));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("feedsync-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("prefs.json");

        let mut value = BTreeMap::new();
        value.insert("interval".to_string(), 900u64);
        save_json_file(&path, &value).unwrap();

        let loaded: BTreeMap<String, u64> = load_json_file(&path).unwrap();
        assert_eq!(loaded.get("interval"), Some(&900));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file_errors() {
        let path = std::env::temp_dir().join("feedsync-definitely-missing.json");
        let result: Result<BTreeMap<String, u64>> = load_json_file(&path);
        assert!(result.is_err());
    }
}
