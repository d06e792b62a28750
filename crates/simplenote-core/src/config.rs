//! Application configuration management.
//!
//! Holds the server address, the last username and the onboarding flag.
//! Configuration is stored at `~/.config/simplenote/config.json`; cached
//! session and notes live under `~/.cache/simplenote/`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "simplenote";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend address as seen from the Android emulator
pub const DEFAULT_API_BASE_URL: &str = "http://10.0.2.2:8000/api/";

/// Overrides `api_base_url`
pub const API_URL_ENV: &str = "SIMPLENOTE_API_URL";

/// Overrides `last_username`
pub const USERNAME_ENV: &str = "SIMPLENOTE_USERNAME";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub last_username: Option<String>,
    pub onboarding_completed: bool,
    pub request_timeout_secs: u64,
    pub monitor_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            last_username: None,
            onboarding_completed: false,
            request_timeout_secs: crate::api::transport::REQUEST_TIMEOUT_SECS,
            monitor_interval_secs: crate::auth::DEFAULT_MONITOR_INTERVAL.as_secs(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides looked up through `var`. Blank values are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let present = |key: &str| var(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(url) = present(API_URL_ENV) {
            self.api_base_url = url;
        }
        if let Some(username) = present(USERNAME_ENV) {
            self.last_username = Some(username);
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }

    pub fn is_onboarding_completed(&self) -> bool {
        self.onboarding_completed
    }

    pub fn complete_onboarding(&mut self) {
        self.onboarding_completed = true;
    }

    pub fn reset_onboarding(&mut self) {
        self.onboarding_completed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.monitor_interval(), Duration::from_secs(60));
        assert!(!config.is_onboarding_completed());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).expect("load");
        assert!(config.last_username.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"last_username": "bob"}"#).expect("write");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.last_username.as_deref(), Some("bob"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_onboarding_survives_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = Config::default();
        config.complete_onboarding();
        config.save_to(&path).expect("save");
        let mut loaded = Config::load_from(&path).expect("load");
        assert!(loaded.is_onboarding_completed());

        loaded.reset_onboarding();
        loaded.save_to(&path).expect("save");
        assert!(!Config::load_from(&path).expect("load").is_onboarding_completed());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            API_URL_ENV => Some("http://localhost:9000/api/".to_string()),
            USERNAME_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "http://localhost:9000/api/");
        assert!(config.last_username.is_none());
    }
}
