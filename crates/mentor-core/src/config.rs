//! Engine configuration.
//!
//! Configuration is read from `<config_dir>/mentor/config.toml` when present,
//! with environment variables taking precedence over file values. All fields
//! have defaults so a missing file yields a working configuration.

use crate::error::{MentorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the OpenAI-compatible chat completions endpoint.
    pub base_url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Connect timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum retry attempts after the initial request attempt.
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "MENTOR_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Session storage settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for persisted sessions. `None` selects the platform default
    /// (`<data_dir>/mentor`).
    pub data_dir: Option<PathBuf>,
}

/// Root configuration for the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: BackendConfig,
    pub storage: StorageConfig,
}

impl EngineConfig {
    /// Loads configuration from the default location, falling back to
    /// defaults if no config file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from an explicit TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file is missing, `Io`/`Serialization` if it
    /// cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MentorError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Returns the default config file path (`<config_dir>/mentor/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mentor").join("config.toml"))
    }

    /// Applies `MENTOR_*` environment variable overrides on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("MENTOR_BASE_URL") {
            self.backend.base_url = base_url;
        }
        if let Ok(model) = std::env::var("MENTOR_MODEL") {
            self.backend.model = model;
        }
        if let Ok(data_dir) = std::env::var("MENTOR_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(data_dir));
        }
    }
}
