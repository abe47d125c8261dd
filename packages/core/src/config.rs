//! Engine configuration, loaded once at startup and passed explicitly.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default file name looked up by [`QueueableConfig::load`].
pub const DEFAULT_CONFIG_FILE: &str = "queueable.config.json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Connection settings for the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    /// Empty means no ACL username.
    pub username: String,
    /// Empty means no authentication.
    pub password: String,
    /// Logical database index.
    pub db: i64,
    /// Prefix for every key written by the engine.
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: String::new(),
            password: String::new(),
            db: 0,
            key_prefix: "queueable".to_string(),
        }
    }
}

impl StoreConfig {
    /// Set host and port.
    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set credentials for authentication.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the logical database index.
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }
}

/// Worker loop tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of workers started per handler by the engine.
    pub concurrency: u32,
    /// First delay after an empty poll.
    pub poll_interval_ms: u64,
    /// Upper bound for the doubling idle backoff.
    pub max_poll_interval_ms: u64,
    /// Handler time budget; `None` waits indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_timeout_ms: Option<u64>,
    /// Consecutive failed claims tolerated before a worker gives up.
    pub store_retry_limit: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval_ms: 100,
            max_poll_interval_ms: 2_000,
            handler_timeout_ms: None,
            store_retry_limit: 3,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms.max(self.poll_interval_ms).max(1))
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }

    /// Set the idle polling bounds.
    pub fn with_poll_interval(mut self, initial: Duration, max: Duration) -> Self {
        self.poll_interval_ms = initial.as_millis() as u64;
        self.max_poll_interval_ms = max.as_millis() as u64;
        self
    }

    /// Set the handler timeout.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the worker count used by the engine.
    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_store_retry_limit(mut self, limit: u32) -> Self {
        self.store_retry_limit = limit;
        self
    }
}

/// Top-level configuration.
///
/// Every section uses serde defaults, so a partial file is merged over the
/// built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueableConfig {
    #[serde(alias = "redis")]
    pub store: StoreConfig,
    pub worker: WorkerConfig,
}

impl QueueableConfig {
    /// Parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load from `path` (or [`DEFAULT_CONFIG_FILE`] in the working directory)
    /// when it exists, otherwise defaults, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.with_env_overrides()
    }

    /// Apply `QUEUEABLE_STORE_*` environment variables.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("QUEUEABLE_STORE_HOST") {
            self.store.host = host;
        }
        if let Some(port) = lookup("QUEUEABLE_STORE_PORT") {
            self.store.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "QUEUEABLE_STORE_PORT".into(),
                value: port.clone(),
            })?;
        }
        if let Some(username) = lookup("QUEUEABLE_STORE_USERNAME") {
            self.store.username = username;
        }
        if let Some(password) = lookup("QUEUEABLE_STORE_PASSWORD") {
            self.store.password = password;
        }
        Ok(self)
    }
}
