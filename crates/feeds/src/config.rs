//! Configuration loading for feed sync services
//!
//! Supports loading the API session from (in order of priority):
//! 1. Compile-time embedded session (for kiosk/test builds)
//! 2. JSON file (~/.config/feedsync/credentials.json)
//! 3. Runtime environment variables (fallback)
//!
//! Sync tuning lives in `settings.json` next to the credentials. Every
//! field has a default, so a missing or partial file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{ReadFilter, StoryOrder};

/// Credentials filename in the feedsync config directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Settings filename in the feedsync config directory
const SETTINGS_FILE: &str = "settings.json";

/// Session credentials for the content API
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Credentials {
    /// Value of the `newsblur_sessionid` cookie
    pub session_id: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl Credentials {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            username: None,
        }
    }

    /// Load credentials using the following priority:
    /// 1. Compile-time embedded session
    /// 2. JSON file (~/.config/feedsync/credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: Credentials = config::load_json(CREDENTIALS_FILE)?;
            return creds.validated();
        }

        Self::from_env()
    }

    /// Session embedded at build time.
    /// Build with: NEWSBLUR_SESSION=xxx cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let session = option_env!("NEWSBLUR_SESSION")?;
        if session.is_empty() {
            return None;
        }
        Some(Self::new(session))
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: Credentials = config::load_json_file(path)?;
        creds.validated()
    }

    /// Parse credentials from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: Credentials =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        creds.validated()
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let session = std::env::var("NEWSBLUR_SESSION")
            .context("NEWSBLUR_SESSION environment variable not set")?;
        let mut creds = Self::new(session);
        creds.username = std::env::var("NEWSBLUR_USERNAME").ok();
        creds.validated()
    }

    /// Persist credentials to the config directory
    pub fn save(&self) -> Result<()> {
        config::save_json(CREDENTIALS_FILE, self)
    }

    /// Get the default credentials file path
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }

    /// Check if credentials are available (compile-time, file, or env vars)
    pub fn is_available() -> bool {
        if Self::from_compile_time().is_some() {
            return true;
        }
        if config::config_exists(CREDENTIALS_FILE) {
            return true;
        }
        std::env::var("NEWSBLUR_SESSION").is_ok()
    }

    fn validated(self) -> Result<Self> {
        if self.session_id.trim().is_empty() {
            anyhow::bail!("Credentials have an empty session id");
        }
        Ok(self)
    }
}

/// Tuning knobs for the sync engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Base URL of the content API
    pub api_base: String,
    /// Global timeout applied to every HTTP request
    pub request_timeout_secs: u64,
    /// Stories fetched per unread-fetch request
    pub unread_fetch_batch_size: usize,
    /// Images cached per prefetch batch
    pub image_prefetch_batch_size: usize,
    pub prefetch_images: bool,
    /// Keep read stories until they age out instead of dropping them at cleanup
    pub keep_old_stories: bool,
    /// Minimum time between unforced metadata refreshes
    pub auto_sync_interval_secs: u64,
    pub default_story_order: StoryOrder,
    pub default_read_filter: ReadFilter,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base: "https://www.newsblur.com".to_string(),
            request_timeout_secs: 30,
            unread_fetch_batch_size: 50,
            image_prefetch_batch_size: 10,
            prefetch_images: true,
            keep_old_stories: false,
            auto_sync_interval_secs: 15 * 60,
            default_story_order: StoryOrder::Newest,
            default_read_filter: ReadFilter::All,
        }
    }
}

impl SyncSettings {
    /// Load settings.json from the config directory, or defaults if absent
    pub fn load() -> Result<Self> {
        if config::config_exists(SETTINGS_FILE) {
            return config::load_json(SETTINGS_FILE);
        }
        Ok(Self::default())
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    pub fn save(&self) -> Result<()> {
        config::save_json(SETTINGS_FILE, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials() {
        let json = r#"{ "session_id": "abc123", "username": "reader" }"#;
        let creds = Credentials::from_json(json).unwrap();
        assert_eq!(creds.session_id, "abc123");
        assert_eq!(creds.username.as_deref(), Some("reader"));
    }

    #[test]
    fn test_empty_session_rejected() {
        assert!(Credentials::from_json(r#"{ "session_id": "  " }"#).is_err());
        assert!(Credentials::from_json(r#"{ "other": 1 }"#).is_err());
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: SyncSettings =
            serde_json::from_str(r#"{ "prefetch_images": false, "default_story_order": "oldest" }"#)
                .unwrap();
        assert!(!settings.prefetch_images);
        assert_eq!(settings.default_story_order, StoryOrder::Oldest);
        assert_eq!(settings.unread_fetch_batch_size, 50);
        assert_eq!(settings.image_prefetch_batch_size, 10);
        assert_eq!(settings.auto_sync_interval_secs, 900);
    }

    #[test]
    fn test_settings_file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let settings = SyncSettings {
            keep_old_stories: true,
            ..SyncSettings::default()
        };
        config::save_json_file(&path, &settings).unwrap();
        assert_eq!(SyncSettings::from_file(&path).unwrap(), settings);
    }
}
