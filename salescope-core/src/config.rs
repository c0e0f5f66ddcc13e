//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/salescope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/salescope/` (~/.config/salescope/)
//! - Data: `$XDG_DATA_HOME/salescope/` (~/.local/share/salescope/)
//! - State/Logs: `$XDG_STATE_HOME/salescope/` (~/.local/state/salescope/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

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
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// LLM planner configuration (optional; absent means the
    /// deterministic fallback planner is always used)
    #[serde(default)]
    pub planner: Option<PlannerConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Override path to the SQLite database file
    pub path: Option<PathBuf>,
}

/// LLM planner configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PlannerConfig {
    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// API endpoint (defaults to the Anthropic API)
    pub endpoint: Option<String>,

    /// API key (falls back to the ANTHROPIC_API_KEY env var)
    pub api_key: Option<String>,

    /// Maximum tokens for the plan response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl PlannerConfig {
    /// API endpoint with the default applied.
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or("https://api.anthropic.com")
    }

    /// API key from config or environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing config file yields the default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }

    /// Returns the config directory
    pub fn config_dir() -> PathBuf {
        xdg_config_home().join("salescope")
    }

    /// Returns the config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Returns the data directory
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("salescope")
    }

    /// Returns the state directory (logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("salescope")
    }

    /// Returns the database path, honoring the config override
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("salescope.db"))
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("salescope.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.planner.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(
            r#"
            [planner]
            model = "claude-sonnet-4-5"
            api_key = "sk-test"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let planner = config.planner.unwrap();
        assert_eq!(planner.model, "claude-sonnet-4-5");
        assert_eq!(planner.max_tokens, 1500);
        assert_eq!(planner.endpoint(), "https://api.anthropic.com");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_database_path_override() {
        let config: Config = toml::from_str(
            r#"
            [database]
            path = "/tmp/sales.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/sales.db"));
    }
}
