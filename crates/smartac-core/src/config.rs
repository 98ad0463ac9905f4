/*!
 * Configuration management for SmartAC.
 *
 * This module provides functionality to load, validate, and access
 * configuration settings for the SmartAC connectivity layer.
 */
use std::path::Path;
use std::sync::Arc;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Top-level configuration for SmartAC
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Connectivity-layer configuration
    #[serde(default)]
    pub link: LinkConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application environment (development, production, etc.)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log to stdout
    #[serde(default = "default_log_stdout")]
    pub stdout: bool,
}

/// Connectivity-layer configuration
///
/// Network timeouts and cache lifetimes for the transport registry and
/// the discovery engine. The transport priority order and the unhealthy
/// threshold are policy constants and are not configurable here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Per-request timeout for local adapter HTTP calls, in milliseconds
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,

    /// Overall discovery scan budget, in milliseconds
    #[serde(default = "default_discovery_budget_ms")]
    pub discovery_budget_ms: u64,

    /// Per-host timeout for discovery port probes, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Discovery result cache time-to-live, in seconds
    #[serde(default = "default_discovery_cache_ttl_secs")]
    pub discovery_cache_ttl_secs: u64,
}

fn default_app_name() -> String {
    "smartac".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_stdout() -> bool {
    true
}

fn default_adapter_timeout_ms() -> u64 {
    5_000
}

fn default_discovery_budget_ms() -> u64 {
    8_000
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

fn default_discovery_cache_ttl_secs() -> u64 {
    300
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            stdout: default_log_stdout(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_ms: default_adapter_timeout_ms(),
            discovery_budget_ms: default_discovery_budget_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            discovery_cache_ttl_secs: default_discovery_cache_ttl_secs(),
        }
    }
}

/// A shared configuration handle
pub type SharedConfig = Arc<Config>;

impl Config {
    /// Load configuration from an optional file plus `SMARTAC_` environment
    /// variable overrides (e.g. `SMARTAC_LINK__PROBE_TIMEOUT_MS=1000`).
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = ConfigLib::builder();

        if let Some(path) = path {
            debug!("Loading configuration from {:?}", path.as_ref());
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(Environment::with_prefix("SMARTAC").separator("__"));

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))
    }

    /// Create a shared handle to this configuration
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.general.app_name, "smartac");
        assert_eq!(config.link.adapter_timeout_ms, 5_000);
        assert_eq!(config.link.discovery_cache_ttl_secs, 300);
        assert_eq!(config.link.probe_timeout_ms, 2_000);
    }

    #[test]
    fn test_load_without_file() {
        let config = Config::load::<&str>(None).unwrap_or_default();
        assert!(!config.general.app_name.is_empty());
    }
}
