//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/liquid/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/liquid/` (~/.config/liquid/)
//! - Data: `$XDG_DATA_HOME/liquid/` (~/.local/share/liquid/)
//! - State/Logs: `$XDG_STATE_HOME/liquid/` (~/.local/state/liquid/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Event queue and delivery configuration
    #[serde(default)]
    pub networking: NetworkingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Upper bound for `networking.batch_size`
pub const MAX_BATCH_SIZE: usize = 500;

/// Event queue and delivery configuration
///
/// `queue_size_limit` and `flush_interval_secs` are only the starting values;
/// both can be changed on a live `NetworkingManager`.
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkingConfig {
    /// Base URL relative endpoints are joined onto
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Maximum number of events held in memory (oldest are evicted beyond this)
    #[serde(default = "default_queue_size_limit")]
    pub queue_size_limit: usize,

    /// Seconds between timer-driven flush cycles
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// Events taken from the head of the queue per flush cycle (max 500)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Archive the queue after every flush cycle that delivered or dropped events
    #[serde(default = "default_persist_on_flush")]
    pub persist_on_flush: bool,

    /// Override for the directory holding persisted queues
    #[serde(default)]
    pub queue_dir: Option<PathBuf>,
}

impl Default for NetworkingConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            queue_size_limit: default_queue_size_limit(),
            flush_interval_secs: default_flush_interval(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout(),
            persist_on_flush: default_persist_on_flush(),
            queue_dir: None,
        }
    }
}

impl NetworkingConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(Error::Config(
                "networking.server_url must not be empty".to_string(),
            ));
        }
        if self.queue_size_limit == 0 {
            return Err(Error::Config(
                "networking.queue_size_limit must be at least 1".to_string(),
            ));
        }
        if self.flush_interval_secs == 0 {
            return Err(Error::Config(
                "networking.flush_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "networking.batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }
        Ok(())
    }

    /// Flush interval as a `Duration`
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory holding persisted queues (override or XDG default)
    pub fn resolved_queue_dir(&self) -> PathBuf {
        self.queue_dir.clone().unwrap_or_else(Config::queue_dir)
    }
}

fn default_server_url() -> String {
    "https://api.lqd.io/collect/".to_string()
}

fn default_queue_size_limit() -> usize {
    1000
}

fn default_flush_interval() -> u64 {
    60
}

fn default_batch_size() -> usize {
    50
}

fn default_timeout() -> u64 {
    30
}

fn default_persist_on_flush() -> bool {
    true
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.networking.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/liquid/config.toml` (~/.config/liquid/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("liquid").join("config.toml")
    }

    /// Returns the data directory path
    ///
    /// `$XDG_DATA_HOME/liquid/` (~/.local/share/liquid/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("liquid")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/liquid/` (~/.local/state/liquid/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("liquid")
    }

    /// Returns the directory holding one persisted queue per token
    ///
    /// `$XDG_DATA_HOME/liquid/queues/`
    pub fn queue_dir() -> PathBuf {
        Self::data_dir().join("queues")
    }
}
