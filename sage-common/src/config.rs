//! Configuration for the Sage conversation client.
//!
//! Configuration is loaded from `~/.sage/config.json` (all fields optional,
//! falling back to defaults), then environment variables:
//!
//! - `SAGE_BASE_URL` → service.base_url
//! - `SAGE_FALLBACK_USERNAME` → auth.fallback_username
//! - `SAGE_FALLBACK_PASSWORD` → auth.fallback_password
//! - `SAGE_LOG_LEVEL` → observability.log_level

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ResultExt};

/// Get the Sage configuration directory (`~/.sage`).
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".sage"),
        |dirs| dirs.home_dir().join(".sage"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote question-answering service
    #[serde(default)]
    pub service: ServiceConfig,

    /// Conversation session behavior
    #[serde(default)]
    pub session: SessionConfig,

    /// Credential acquisition
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Remote service endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service base URL (default: <http://localhost:8000>)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Conversation session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of turns retained in the context window (default: 10)
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

/// Fallback identity used for transparent credential renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_fallback_username")]
    pub fallback_username: String,

    #[serde(default = "default_fallback_password")]
    pub fallback_password: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format: "json" or "pretty" (default: pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_history() -> usize {
    10
}

fn default_fallback_username() -> String {
    "demo".to_string()
}

fn default_fallback_password() -> String {
    "demo-password".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            fallback_username: default_fallback_username(),
            fallback_password: default_fallback_password(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check loaded values.
    pub fn validate(&self) -> Result<()> {
        if self.service.base_url.is_empty() {
            return Err(Error::Config("service.base_url must not be empty".into()));
        }
        if self.session.max_history == 0 {
            return Err(Error::Config("session.max_history must be at least 1".into()));
        }
        Ok(())
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("SAGE_BASE_URL") {
            self.service.base_url = url;
        }
        if let Some(username) = get("SAGE_FALLBACK_USERNAME") {
            self.auth.fallback_username = username;
        }
        if let Some(password) = get("SAGE_FALLBACK_PASSWORD") {
            self.auth.fallback_password = password;
        }
        if let Some(level) = get("SAGE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }
}
