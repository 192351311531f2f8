//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, which credential backend to use, and session timing.
//!
//! Configuration is stored at `~/.config/ourschool/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::RenewalPolicy;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "ourschool";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend API base URL when neither the environment nor the config sets one
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "OURSCHOOL_API_URL";

/// Where session credentials are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON file in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub store: StoreBackend,
    pub last_username: Option<String>,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Session timing as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub monitor_interval_secs: u64,
    pub renewal_interval_secs: u64,
    pub warning_threshold_minutes: i64,
    /// Idle time after which silent renewal stops
    pub inactivity_ceiling_minutes: i64,
    /// Overrides half the inactivity ceiling
    pub activity_window_minutes: Option<i64>,
    /// Overrides the full inactivity ceiling
    pub renewal_window_minutes: Option<i64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            monitor_interval_secs: 30,
            renewal_interval_secs: 120,
            warning_threshold_minutes: 15,
            inactivity_ceiling_minutes: 10,
            activity_window_minutes: None,
            renewal_window_minutes: None,
        }
    }
}

impl SessionSettings {
    pub fn to_session_config(&self) -> SessionConfig {
        let derived = RenewalPolicy::from_inactivity_ceiling(chrono::Duration::minutes(
            self.inactivity_ceiling_minutes.max(0),
        ));
        let renewal = RenewalPolicy {
            activity_window: self
                .activity_window_minutes
                .map(chrono::Duration::minutes)
                .unwrap_or(derived.activity_window),
            renewal_window: self
                .renewal_window_minutes
                .map(chrono::Duration::minutes)
                .unwrap_or(derived.renewal_window),
        };

        SessionConfig {
            // Timer periods must be non-zero
            monitor_interval: std::time::Duration::from_secs(self.monitor_interval_secs.max(1)),
            renewal_interval: std::time::Duration::from_secs(self.renewal_interval_secs.max(1)),
            warning_threshold: chrono::Duration::minutes(self.warning_threshold_minutes.max(0)),
            renewal,
        }
    }
}

/// Runtime session timing used by the `SessionController`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub monitor_interval: std::time::Duration,
    pub renewal_interval: std::time::Duration,
    pub warning_threshold: chrono::Duration,
    pub renewal: RenewalPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionSettings::default().to_session_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// API base URL: environment first, then config, then the local default.
    pub fn api_base_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_config() {
        let config = SessionConfig::default();
        assert_eq!(config.monitor_interval, std::time::Duration::from_secs(30));
        assert_eq!(config.renewal_interval, std::time::Duration::from_secs(120));
        assert_eq!(config.warning_threshold, chrono::Duration::minutes(15));
        assert_eq!(config.renewal.activity_window, chrono::Duration::minutes(5));
        assert_eq!(config.renewal.renewal_window, chrono::Duration::minutes(10));
    }

    #[test]
    fn test_parse_partial_config() {
        let json = r#"{"api_base_url":"https://school.example/api","store":"keyring","session":{"warning_threshold_minutes":5,"activity_window_minutes":3}}"#;
        let config: Config = serde_json::from_str(json).expect("Failed to parse config test JSON");
        assert_eq!(config.store, StoreBackend::Keyring);
        assert_eq!(config.last_username, None);

        let session = config.session.to_session_config();
        assert_eq!(session.warning_threshold, chrono::Duration::minutes(5));
        assert_eq!(session.monitor_interval, std::time::Duration::from_secs(30));
        assert_eq!(session.renewal.activity_window, chrono::Duration::minutes(3));
        assert_eq!(session.renewal.renewal_window, chrono::Duration::minutes(10));
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let settings = SessionSettings {
            monitor_interval_secs: 0,
            renewal_interval_secs: 0,
            ..SessionSettings::default()
        };
        let session = settings.to_session_config();
        assert_eq!(session.monitor_interval, std::time::Duration::from_secs(1));
        assert_eq!(session.renewal_interval, std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_empty_config_defaults() {
        let config: Config = serde_json::from_str("{}").expect("Failed to parse empty config");
        assert_eq!(config.store, StoreBackend::File);
        assert_eq!(config.session, SessionSettings::default());
    }
}
