//! Configuration management for the Doca session layer
//!
//! Settings live in `config.json` inside the platform config directory. The
//! API base URL can be overridden with the `DOCA_API_URL` environment variable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`AppConfig::api_base_url`]
pub const API_URL_ENV: &str = "DOCA_API_URL";

/// Session layer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the storefront REST API
    pub api_base_url: String,
    /// Timeout applied to every API request, in seconds
    pub request_timeout_secs: u64,
    /// Minimum interval between session re-validations, in minutes
    pub staleness_minutes: u64,
    /// Lifetime of the mirrored session cookies, in days
    pub cookie_max_age_days: i64,
    /// Where the UI goes after logout or session expiry
    pub login_path: String,
    /// Token refresh endpoint; `None` turns every refresh into a logout
    pub refresh_path: Option<String>,
    /// How often the storage sync agent polls the shared store, in seconds
    pub storage_sync_interval_secs: u64,
    /// Number of API calls kept by the monitor
    pub monitor_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 10,
            staleness_minutes: 5,
            cookie_max_age_days: 7,
            login_path: "/login".to_string(),
            refresh_path: None,
            storage_sync_interval_secs: 2,
            monitor_capacity: 100,
        }
    }
}

impl AppConfig {
    /// Gets the config directory path (cross-platform)
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join("Doca"))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support/Doca"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join("doca"))
        }
    }

    /// Gets the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Loads configuration from the default location
    ///
    /// Missing or unreadable files fall back to defaults; the environment
    /// override is applied either way.
    pub fn load() -> Self {
        let mut config = Self::config_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Ignoring config at {:?}: {:#}", path, e);
                    None
                }
            })
            .unwrap_or_default();
        config.apply_env();
        config
    }

    /// Loads configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Saves configuration to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("Could not determine config path")?;
        self.save_to(&path)
    }

    /// Saves configuration to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file {:?}", path))
    }

    /// Applies environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Staleness threshold as a `Duration`
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_minutes * 60)
    }

    /// Storage sync poll interval as a `Duration`
    pub fn storage_sync_interval(&self) -> Duration {
        Duration::from_secs(self.storage_sync_interval_secs.max(1))
    }
}
