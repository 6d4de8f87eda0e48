//! Configuration management for ollamachat
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.ollamachat/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::errors::{ClientError, Result};

/// Default Ollama server address
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Log levels accepted in `[logging] level`
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Settings the client reads at the start of every call.
///
/// Implementations must return the current value on each call; the client
/// never caches them between requests.
pub trait SettingsSource: Send + Sync {
    /// Configured base URL, as entered (may carry a trailing slash)
    fn ollama_url(&self) -> String;

    /// Model used when a call does not name one (empty when unset)
    fn current_model(&self) -> String;

    /// Whether responses should be streamed token by token
    fn stream_response(&self) -> bool;
}

/// Complete configuration for ollamachat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ollama connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub current_model: String,
    pub stream_response: bool,
    pub request_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            current_model: String::new(),
            stream_response: true,
            request_timeout_secs: 60,
            idle_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard config file location, if a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ollamachat").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.ollama.url.trim().is_empty() {
            return Err(ClientError::Config("url must not be empty".to_string()));
        }

        if self.ollama.request_timeout_secs == 0 {
            return Err(ClientError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.ollama.idle_timeout_secs == 0 {
            return Err(ClientError::Config(
                "idle_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ClientError::Config(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::Config(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ClientError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.request_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.idle_timeout_secs)
    }
}

impl SettingsSource for Config {
    fn ollama_url(&self) -> String {
        self.ollama.url.clone()
    }

    fn current_model(&self) -> String {
        self.ollama.current_model.clone()
    }

    fn stream_response(&self) -> bool {
        self.ollama.stream_response
    }
}

/// Configuration shared with a running client
///
/// Edits made through [`SharedConfig::update`] are seen by the next call
/// the client makes.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Config>>,
}

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> Config {
        self.read(Clone::clone)
    }

    /// Apply an edit in place
    pub fn update(&self, edit: impl FnOnce(&mut Config)) {
        // A poisoned lock still holds a usable Config.
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        edit(&mut guard);
    }

    fn read<T>(&self, f: impl FnOnce(&Config) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }
}

impl SettingsSource for SharedConfig {
    fn ollama_url(&self) -> String {
        self.read(|c| c.ollama.url.clone())
    }

    fn current_model(&self) -> String {
        self.read(|c| c.ollama.current_model.clone())
    }

    fn stream_response(&self) -> bool {
        self.read(|c| c.ollama.stream_response)
    }
}
