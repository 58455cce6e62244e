//! Configuration management for ted
//!
//! Handles config file loading/saving and derives per-client settings.
//! Config is stored at ~/.config/ted/config.toml; environment variables
//! override file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::rdtclient::RdtSettings;
use crate::api::realdebrid::{DebridSettings, DEFAULT_BASE_URL as DEFAULT_DEBRID_URL};
use crate::api::torrentio::DEFAULT_BASE_URL as DEFAULT_TORRENTIO_URL;
use crate::error::ResolveError;
use crate::resolve::PollPolicy;

const DEFAULT_MOVIES_PATH: &str = "Movies";
const DEFAULT_SHOWS_PATH: &str = "TV Shows";

/// Keys accepted by `ted config set`
pub const SETTABLE_KEYS: &[&str] = &[
    "real_debrid_api_key",
    "real_debrid_url",
    "rdt_client_url",
    "rdt_client_username",
    "rdt_client_password",
    "rdt_client_movies_path",
    "rdt_client_shows_path",
    "torrentio_url",
];

/// Poll tuning for debrid processing, in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollConfig {
    pub initial_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub max_delay_ms: Option<u64>,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Real-Debrid API token
    pub real_debrid_api_key: Option<String>,
    /// Real-Debrid REST base URL
    pub real_debrid_url: Option<String>,
    /// RDT Client base URL (direct, or through a reverse proxy)
    pub rdt_client_url: Option<String>,
    pub rdt_client_username: Option<String>,
    pub rdt_client_password: Option<String>,
    /// Download folder for movies
    pub rdt_client_movies_path: Option<String>,
    /// Download folder for series
    pub rdt_client_shows_path: Option<String>,
    /// Torrentio addon base URL
    pub torrentio_url: Option<String>,
    #[serde(default)]
    pub poll: PollConfig,
}

/// Non-empty, trimmed value
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Config {
    /// Get default config file path (~/.config/ted/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ted").join("config.toml"))
    }

    /// Load config from the default path (or return defaults), then apply
    /// environment overrides
    pub fn load() -> Self {
        let mut config: Config = Self::path()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default();
        config.apply_env();
        config
    }

    /// Load config from an explicit path. Unlike `load`, a missing or
    /// malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse a config file as-is, without environment overrides
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Environment variables win over file values
    fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let pairs: [(&str, &mut Option<String>); 6] = [
            ("REAL_DEBRID_API_KEY", &mut self.real_debrid_api_key),
            ("RDT_CLIENT_URL", &mut self.rdt_client_url),
            ("RDT_CLIENT_USERNAME", &mut self.rdt_client_username),
            ("RDT_CLIENT_PASSWORD", &mut self.rdt_client_password),
            ("RDT_CLIENT_MOVIES_PATH", &mut self.rdt_client_movies_path),
            ("RDT_CLIENT_SHOWS_PATH", &mut self.rdt_client_shows_path),
        ];
        for (key, slot) in pairs {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = Some(value);
            }
        }
    }

    /// Set a value by key name (used by `ted config set`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = Some(value.to_string());
        match key {
            "real_debrid_api_key" => self.real_debrid_api_key = value,
            "real_debrid_url" => self.real_debrid_url = value,
            "rdt_client_url" => self.rdt_client_url = value,
            "rdt_client_username" => self.rdt_client_username = value,
            "rdt_client_password" => self.rdt_client_password = value,
            "rdt_client_movies_path" => self.rdt_client_movies_path = value,
            "rdt_client_shows_path" => self.rdt_client_shows_path = value,
            "torrentio_url" => self.torrentio_url = value,
            other => anyhow::bail!(
                "Unknown config key '{}'. Valid keys: {}",
                other,
                SETTABLE_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| present(v).map(|_| "********".to_string());
        Self {
            real_debrid_api_key: mask(&self.real_debrid_api_key),
            rdt_client_password: mask(&self.rdt_client_password),
            ..self.clone()
        }
    }

    /// Settings for the Real-Debrid client
    pub fn debrid_settings(&self) -> Result<DebridSettings, ResolveError> {
        let api_key = present(&self.real_debrid_api_key).ok_or_else(|| {
            ResolveError::Configuration(
                "Real-Debrid API key not configured (set real_debrid_api_key or REAL_DEBRID_API_KEY)"
                    .to_string(),
            )
        })?;
        let base_url = present(&self.real_debrid_url).unwrap_or(DEFAULT_DEBRID_URL);

        Ok(DebridSettings {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Settings for the RDT Client session and adapter.
    ///
    /// Missing credentials are left for login to reject.
    pub fn rdt_settings(&self) -> Result<RdtSettings, ResolveError> {
        let base_url = present(&self.rdt_client_url).ok_or_else(|| {
            ResolveError::Configuration(
                "RDT Client URL not configured (set rdt_client_url or RDT_CLIENT_URL)".to_string(),
            )
        })?;

        Ok(RdtSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: present(&self.rdt_client_username).map(str::to_string),
            password: self.rdt_client_password.clone().filter(|p| !p.is_empty()),
            movies_path: present(&self.rdt_client_movies_path)
                .unwrap_or(DEFAULT_MOVIES_PATH)
                .to_string(),
            shows_path: present(&self.rdt_client_shows_path)
                .unwrap_or(DEFAULT_SHOWS_PATH)
                .to_string(),
        })
    }

    /// Torrentio base URL
    pub fn torrentio_url(&self) -> String {
        present(&self.torrentio_url)
            .unwrap_or(DEFAULT_TORRENTIO_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// Backoff policy for waiting on debrid processing
    pub fn poll_policy(&self) -> PollPolicy {
        let defaults = PollPolicy::default();
        PollPolicy {
            initial_delay: self
                .poll
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            max_attempts: self
                .poll
                .max_attempts
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            max_delay: self
                .poll
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
        }
    }
}
