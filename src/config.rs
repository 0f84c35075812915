//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::ErrorPolicy;
use crate::client::MessageSource;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Where the session triplet is persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Forgotten when the process exits
    Memory,
    /// JSON file, by default under the per-user runtime directory
    #[default]
    File,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "file" => Ok(StoreKind::File),
            other => Err(format!("unknown session store: {}", other)),
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub store: StoreKind,

    /// Override for the session file location
    pub path: Option<String>,
}

/// Data cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// What a failed fetch does to the cached collection
    #[serde(default)]
    pub on_error: ErrorPolicy,

    #[serde(default = "default_analytics_range")]
    pub analytics_range: String,

    #[serde(default)]
    pub default_source: MessageSource,
}

fn default_analytics_range() -> String {
    "30d".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            on_error: ErrorPolicy::default(),
            analytics_range: default_analytics_range(),
            default_source: MessageSource::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("triage").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first existing file of `paths`, falling back to the environment
    ///
    /// A file that fails to load is reported with `tracing::warn!` and skipped.
    pub fn load_first(paths: &[PathBuf]) -> Self {
        for path in paths {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // API overrides
        if let Ok(url) = std::env::var("TRIAGE_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(timeout) = std::env::var("TRIAGE_API_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.api.request_timeout_secs = secs;
            }
        }

        // Session overrides
        if let Ok(store) = std::env::var("TRIAGE_SESSION_STORE") {
            match store.parse() {
                Ok(kind) => self.session.store = kind,
                Err(e) => tracing::warn!("Ignoring TRIAGE_SESSION_STORE: {}", e),
            }
        }
        if let Ok(path) = std::env::var("TRIAGE_SESSION_PATH") {
            self.session.path = Some(path);
        }

        // Cache overrides
        if let Ok(policy) = std::env::var("TRIAGE_CACHE_ON_ERROR") {
            match policy.parse() {
                Ok(policy) => self.cache.on_error = policy,
                Err(e) => tracing::warn!("Ignoring TRIAGE_CACHE_ON_ERROR: {}", e),
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("TRIAGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TRIAGE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Triage Configuration
#
# Environment variables override these settings:
# - TRIAGE_API_URL
# - TRIAGE_API_TIMEOUT
# - TRIAGE_SESSION_STORE
# - TRIAGE_SESSION_PATH
# - TRIAGE_CACHE_ON_ERROR
# - TRIAGE_LOG_LEVEL
# - TRIAGE_LOG_FORMAT

[api]
# Triage backend URL
base_url = "http://localhost:8000"

# Request timeout in seconds
request_timeout_secs = 30

[session]
# Where the session token is kept: "file" or "memory"
store = "file"

# Optional session file path (default: <runtime dir>/triage/session.json)
# path = "/run/user/1000/triage/session.json"

[cache]
# On a failed fetch: "clear" empties the collection, "keep" shows stale data
on_error = "clear"

# Analytics time range
analytics_range = "30d"

# Source used when triggering message collection
default_source = "gmail"

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
