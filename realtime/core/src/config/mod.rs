//! TOML Configuration File Support
//!
//! This module provides centralized configuration loading for the realtime
//! client, supporting a TOML configuration file at
//! `~/.config/realtime-chat/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (when applicable)
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows XDG Base Directory specification:
//! - `$XDG_CONFIG_HOME/realtime-chat/client.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! [transport]
//! endpoint = "wss://chat.example.com/realtime"
//! connect_timeout_ms = 5000
//! reconnect_attempts = 5
//! reconnect_delay_ms = 1000
//!
//! [diagnostics]
//! channel_capacity = 256
//! ```
//!
//! The credential is deliberately absent from the file format; it comes from
//! `REALTIME_TOKEN` or a CLI override.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::DEFAULT_DIAGNOSTICS_CAPACITY;
use crate::transport::config::{Credential, TransportConfig};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Transport section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportToml {
    /// Backend URL
    pub endpoint: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Number of reconnection attempts
    pub reconnect_attempts: Option<u32>,

    /// Base delay between reconnection attempts in milliseconds
    pub reconnect_delay_ms: Option<u64>,
}

/// Diagnostics section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsToml {
    /// Broadcast channel capacity
    pub channel_capacity: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeToml {
    /// Transport configuration section
    pub transport: TransportToml,

    /// Diagnostics configuration section
    pub diagnostics: DiagnosticsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for the realtime client
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// Transport configuration
    pub transport: TransportConfig,

    /// Diagnostics broadcast capacity
    pub diagnostics_capacity: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            diagnostics_capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl RealtimeConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check the configuration for values the client cannot run with
    ///
    /// `reconnect_attempts = 0` is valid and disables reconnection.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "transport.endpoint must not be empty".to_string(),
            ));
        }
        if self.transport.reconnect_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "transport.reconnect_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.diagnostics_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "diagnostics.channel_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/realtime-chat/client.toml` or
/// `~/.config/realtime-chat/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("realtime-chat").join("client.toml"))
}

/// Load configuration from all sources with proper priority
///
/// Priority order (highest first):
/// 1. CLI arguments (not handled here - caller should apply after)
/// 2. Environment variables
/// 3. TOML configuration file
/// 4. Default values
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged configuration is invalid. A missing config file is not an error.
pub fn load_config() -> Result<RealtimeConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<RealtimeConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration resolving environment variables through `lookup`
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, lookup: F) -> Result<RealtimeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Start with defaults
    let mut config = RealtimeConfig::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_config = read_toml(config_path)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    apply_env_config(&mut config, lookup);

    config.validate()?;
    Ok(config)
}

fn read_toml(path: &Path) -> Result<RealtimeToml, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut RealtimeConfig, toml: &RealtimeToml) {
    if let Some(ref endpoint) = toml.transport.endpoint {
        config.transport.endpoint = endpoint.clone();
    }
    if let Some(timeout) = toml.transport.connect_timeout_ms {
        config.transport.connect_timeout_ms = timeout;
    }
    if let Some(attempts) = toml.transport.reconnect_attempts {
        config.transport.reconnect_attempts = attempts;
    }
    if let Some(delay) = toml.transport.reconnect_delay_ms {
        config.transport.reconnect_delay_ms = delay;
    }
    if let Some(capacity) = toml.diagnostics.channel_capacity {
        config.diagnostics_capacity = capacity;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut RealtimeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = config.transport.apply_env(&lookup);

    if let Some(capacity) = lookup("REALTIME_DIAGNOSTICS_CAPACITY").and_then(|v| v.parse().ok()) {
        config.diagnostics_capacity = capacity;
        applied = true;
    }

    if applied {
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub endpoint: Option<String>,

    /// Credential override
    pub credential: Option<Credential>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,

    /// Reconnect attempts override
    pub reconnect_attempts: Option<u32>,

    /// Base reconnect delay override (milliseconds)
    pub reconnect_delay_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Override the credential
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Override the connect timeout
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Override the reconnect budget
    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = Some(attempts);
        self
    }

    /// Override the base reconnect delay
    #[must_use]
    pub fn with_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.reconnect_delay_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut RealtimeConfig) {
        if self.endpoint.is_some()
            || self.credential.is_some()
            || self.connect_timeout_ms.is_some()
            || self.reconnect_attempts.is_some()
            || self.reconnect_delay_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref endpoint) = self.endpoint {
            config.transport.endpoint = endpoint.clone();
        }
        if let Some(ref credential) = self.credential {
            config.transport.credential = Some(credential.clone());
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.transport.connect_timeout_ms = timeout;
        }
        if let Some(attempts) = self.reconnect_attempts {
            config.transport.reconnect_attempts = attempts;
        }
        if let Some(delay) = self.reconnect_delay_ms {
            config.transport.reconnect_delay_ms = delay;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
