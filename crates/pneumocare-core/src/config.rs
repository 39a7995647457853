//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URL, request timeout, renewal schedule, where tokens are kept, and
//! the last used username.
//!
//! Configuration is stored at `~/.config/pneumocare/config.json`. Every field
//! is optional; environment variables override the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::client::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::auth::manager::DEFAULT_RENEWAL_INTERVAL;
use crate::auth::{FileTokenStore, KeyringTokenStore, SessionSettings, TokenStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "pneumocare";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Overrides `api_base_url`
pub const ENV_API_BASE_URL: &str = "PNEUMOCARE_API_BASE_URL";

/// Overrides `renewal_interval_secs`
pub const ENV_RENEWAL_SECS: &str = "PNEUMOCARE_RENEWAL_SECS";

/// Shortest accepted renewal interval, to avoid hammering the refresh endpoint
const MIN_RENEWAL_SECS: u64 = 10;

/// Where the credential pair is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub renewal_interval_secs: Option<u64>,
    pub renew_on_start: Option<bool>,
    #[serde(default)]
    pub token_storage: TokenStorage,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Record `username` as the last used one in the config file.
    /// Only the file's own contents are rewritten, so environment and
    /// command-line overrides applied to a loaded `Config` never persist.
    pub fn remember_username(username: &str) -> Result<()> {
        Self::remember_username_at(&Self::config_path()?, username)
    }

    pub fn remember_username_at(path: &Path, username: &str) -> Result<()> {
        let mut on_disk = Self::load_from(path)?;
        on_disk.last_username = Some(username.to_string());
        on_disk.save_to(path)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the token file
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, ignoring values that do not parse
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url.trim().to_string());
        }
        if let Some(raw) = lookup(ENV_RENEWAL_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.renewal_interval_secs = Some(secs),
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {}", ENV_RENEWAL_SECS),
            }
        }
        self
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn session_settings(&self) -> SessionSettings {
        let renewal_interval = self
            .renewal_interval_secs
            .map(|secs| Duration::from_secs(secs.max(MIN_RENEWAL_SECS)))
            .unwrap_or(DEFAULT_RENEWAL_INTERVAL);
        SessionSettings {
            renewal_interval,
            renew_on_start: self.renew_on_start.unwrap_or(true),
        }
    }

    /// Build the configured token store
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_storage {
            TokenStorage::File => Arc::new(FileTokenStore::new(self.data_dir()?)),
            TokenStorage::Keyring => Arc::new(KeyringTokenStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "http://localhost:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.session_settings().renewal_interval, DEFAULT_RENEWAL_INTERVAL);
        assert!(config.session_settings().renew_on_start);
        assert_eq!(config.token_storage, TokenStorage::File);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_fields() {
        let config: Config =
            serde_json::from_str(r#"{"renewal_interval_secs": 60, "token_storage": "keyring"}"#)
                .unwrap();
        assert_eq!(config.session_settings().renewal_interval, Duration::from_secs(60));
        assert_eq!(config.token_storage, TokenStorage::Keyring);
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn test_renewal_interval_has_floor() {
        let config = Config {
            renewal_interval_secs: Some(1),
            ..Default::default()
        };
        assert_eq!(
            config.session_settings().renewal_interval,
            Duration::from_secs(MIN_RENEWAL_SECS)
        );
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_BASE_URL, " https://api.example.test "),
            (ENV_RENEWAL_SECS, "120"),
        ]
        .into_iter()
        .collect();
        let config = Config::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_base_url(), "https://api.example.test");
        assert_eq!(config.renewal_interval_secs, Some(120));
    }

    #[test]
    fn test_invalid_override_ignored() {
        let config = Config {
            renewal_interval_secs: Some(300),
            ..Default::default()
        }
        .with_overrides(|k| (k == ENV_RENEWAL_SECS).then(|| "soon".to_string()));
        assert_eq!(config.renewal_interval_secs, Some(300));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pneumocare").join(CONFIG_FILE);
        let config = Config {
            last_username: Some("alice".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.last_username.as_deref(), Some("alice"));
        assert!(Config::load_from(&dir.path().join("missing.json")).unwrap().last_username.is_none());
    }

    #[test]
    fn test_remember_username_keeps_overrides_out_of_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        Config {
            renewal_interval_secs: Some(300),
            ..Default::default()
        }
        .save_to(&path)
        .unwrap();

        let effective = Config::load_from(&path).unwrap().with_overrides(|k| match k {
            ENV_API_BASE_URL => Some("http://staging.example.test".to_string()),
            ENV_RENEWAL_SECS => Some("60".to_string()),
            _ => None,
        });
        assert_eq!(effective.api_base_url(), "http://staging.example.test");

        Config::remember_username_at(&path, "alice").unwrap();

        let on_disk = Config::load_from(&path).unwrap();
        assert_eq!(on_disk.last_username.as_deref(), Some("alice"));
        assert!(on_disk.api_base_url.is_none());
        assert_eq!(on_disk.renewal_interval_secs, Some(300));
    }

    #[test]
    fn test_remember_username_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pneumocare").join(CONFIG_FILE);
        Config::remember_username_at(&path, "bob").unwrap();
        assert_eq!(
            Config::load_from(&path).unwrap().last_username.as_deref(),
            Some("bob")
        );
    }
}
