//! Configuration management for the exporter.
//!
//! Settings can be specified in multiple places and are merged with clear
//! precedence rules.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (given with --config)
//! 3. Environment variables (`LISTEN_ADDRESS`, `DEFAULT_TIMEOUT`, `LOG_LEVEL`)
//! 4. Command-line arguments (highest priority)
//!
//! Invalid environment values are ignored and the next lower layer applies.
//!
//! # Example Configuration File
//!
//! ```toml
//! listen_address = ":3000"
//! default_timeout = 10
//! log_level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDRESS: &str = ":3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const ENV_LISTEN_ADDRESS: &str = "LISTEN_ADDRESS";
pub const ENV_DEFAULT_TIMEOUT: &str = "DEFAULT_TIMEOUT";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Layered configuration.
///
/// All fields are optional to support partial configuration and merging.
/// Missing values are filled in by lower layers when merged.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the HTTP server listens on, `host:port` or `:port`
    pub listen_address: Option<String>,
    /// Probe timeout in seconds when a scrape does not carry one
    pub default_timeout: Option<u64>,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: Option<String>,
}

/// Resolved, read-only settings shared by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Address to bind, always in `host:port` form
    pub listen_address: String,
    /// Probe timeout used when a scrape does not carry one
    pub default_timeout: Duration,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            listen_address: normalize_listen_address(DEFAULT_LISTEN_ADDRESS),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Creates a configuration holding the built-in defaults.
    ///
    /// # Default Values
    ///
    /// - `listen_address`: ":3000"
    /// - `default_timeout`: 10 seconds
    /// - `log_level`: "info"
    pub fn defaults() -> Self {
        Config {
            listen_address: Some(DEFAULT_LISTEN_ADDRESS.to_string()),
            default_timeout: Some(DEFAULT_TIMEOUT_SECS),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds configuration from a variable lookup function.
    ///
    /// Empty values are treated as absent. `DEFAULT_TIMEOUT` must be a
    /// positive integer number of seconds, anything else is ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Config {
            listen_address: non_empty(ENV_LISTEN_ADDRESS),
            default_timeout: non_empty(ENV_DEFAULT_TIMEOUT)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|seconds| *seconds > 0),
            log_level: non_empty(ENV_LOG_LEVEL),
        }
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) override other layers.
    pub fn from_cli_args(
        listen_address: Option<String>,
        default_timeout: Option<u64>,
        log_level: Option<String>,
    ) -> Self {
        Config {
            listen_address,
            default_timeout,
            log_level,
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if `other` has a value it overrides this one.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.listen_address.is_some() {
            self.listen_address = other.listen_address;
        }
        if other.default_timeout.is_some() {
            self.default_timeout = other.default_timeout;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        self
    }

    /// Validates the merged configuration and turns it into [`Settings`].
    ///
    /// Fields left unset fall back to the built-in defaults.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let merged = Config::defaults().merge_with(self);

        let listen_address = merged
            .listen_address
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string());
        if listen_address.trim().is_empty() || !listen_address.contains(':') {
            return Err(ConfigError::Validation(format!(
                "listen address '{}' must be in host:port or :port form",
                listen_address
            )));
        }

        let default_timeout = merged.default_timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if default_timeout == 0 {
            return Err(ConfigError::Validation(
                "default timeout must be at least one second".to_string(),
            ));
        }

        Ok(Settings {
            listen_address: normalize_listen_address(&listen_address),
            default_timeout: Duration::from_secs(default_timeout),
            log_level: merged
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        toml::to_string_pretty(&Config::defaults())
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Expands `:port` to the IPv6 wildcard address.
///
/// On dual-stack hosts `[::]` accepts IPv4 connections too. The server falls
/// back to `0.0.0.0` where IPv6 is unavailable.
fn normalize_listen_address(address: &str) -> String {
    let address = address.trim();
    if address.starts_with(':') {
        format!("[::]{}", address)
    } else {
        address.to_string()
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (invalid values)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
