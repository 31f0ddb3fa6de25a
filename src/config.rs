//! Configuration management for the query console.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for named SQL connection targets and REST API settings.

use crate::error::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use url::Url;

/// Default REST API root of a local console instance.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8989/v1";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// REST API configuration.
    #[serde(default)]
    pub api: ApiConfig,

    /// Query execution settings.
    #[serde(default)]
    pub query: QuerySettings,

    /// Named connection targets.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionParams>,
}

/// REST API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, e.g. `http://127.0.0.1:8989/v1`.
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// REST API user (sent as basic auth).
    pub user: Option<String>,

    /// REST API password.
    pub password: Option<String>,

    /// Optional request timeout. No timeout is applied when unset.
    pub timeout_secs: Option<u64>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            user: None,
            password: None,
            timeout_secs: None,
        }
    }
}

impl ApiConfig {
    /// Parses and validates the base URL.
    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConsoleError::config(format!("Invalid API URL: {e}")))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConsoleError::config(format!(
                "Invalid scheme '{}'. Expected 'http' or 'https'",
                url.scheme()
            )));
        }

        Ok(url)
    }

    /// Applies `CONSOLE_API_URL`, `CONSOLE_API_USER` and `CONSOLE_API_PASSWORD`.
    ///
    /// Environment values only fill what the config file left at its default.
    pub fn apply_env_defaults(&mut self) {
        if self.base_url == DEFAULT_API_URL {
            if let Ok(url) = std::env::var("CONSOLE_API_URL") {
                self.base_url = url;
            }
        }
        if self.user.is_none() {
            self.user = std::env::var("CONSOLE_API_USER").ok();
        }
        if self.password.is_none() {
            self.password = std::env::var("CONSOLE_API_PASSWORD").ok();
        }
    }
}

/// Query execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    /// `max_rows` sent with every query.
    #[serde(default = "default_row_limit")]
    pub row_limit: u32,

    /// Number of entries kept by the query log.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_row_limit() -> u32 {
    10_000
}

fn default_log_capacity() -> usize {
    500
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            row_limit: default_row_limit(),
            log_capacity: default_log_capacity(),
        }
    }
}

/// Parameters for opening a SQL connection through the REST API.
///
/// Serialized as the body of `POST /sql`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConnectionParams {
    /// Server, service or listener the connection is opened against.
    pub target: String,

    /// Database user.
    pub user: String,

    /// Database password.
    #[serde(default)]
    pub password: String,

    /// Default database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,

    /// Idle timeout in seconds.
    #[serde(default = "default_conn_timeout")]
    pub timeout: u64,
}

fn default_conn_timeout() -> u64 {
    300
}

impl ConnectionParams {
    /// Creates connection parameters with the default idle timeout.
    pub fn new(target: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            user: user.into(),
            password: String::new(),
            db: None,
            timeout: default_conn_timeout(),
        }
    }

    /// Returns a display-safe string (no password).
    pub fn display_string(&self) -> String {
        match &self.db {
            Some(db) => format!("{}@{} ({db})", self.user, self.target),
            None => format!("{}@{}", self.user, self.target),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("query-console")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConsoleError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            ConsoleError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.api.url()?;
        Ok(config)
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionParams> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }
}
