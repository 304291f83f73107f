//! Configuration management for jmx-reporter
//!
//! Handles loading and validating configuration from YAML files.
//!
//! # Example
//!
//! ```yaml
//! agent:
//!   endpoint: host-01
//!   container_runtime: false
//! plugin:
//!   server_name: tomcat
//!   metric_prefix: tomcat
//!   step: 60
//!   dir_paths:
//!     4242: /opt/tomcat
//! cache:
//!   ttl_secs: 600
//! selectors:
//!   - object_name: "java.lang:type=Threading"
//!     metrics: ThreadCount
//!     alias: threads
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::selector::MetricSelector;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent-wide settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Plugin identity and directory lookup
    #[serde(default)]
    pub plugin: PluginConfig,

    /// Directory cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Configured metric selectors
    #[serde(default)]
    pub selectors: Vec<MetricSelector>,
}

/// Agent-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Endpoint identity stamped on every record
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Running under a container runtime
    #[serde(default)]
    pub container_runtime: bool,
}

/// Plugin identity and directory lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Server identity used in the `service` tag
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Metric namespace, joined with `.`
    #[serde(default)]
    pub metric_prefix: String,

    /// Reporting interval in seconds
    #[serde(default = "default_step")]
    pub step: u64,

    /// Static pid → install directory map
    #[serde(default)]
    pub dir_paths: HashMap<u32, String>,
}

/// Directory cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

// Default value functions
fn default_endpoint() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_server_name() -> String {
    "jmx".to_string()
}

fn default_step() -> u64 {
    60
}

fn default_ttl_secs() -> u64 {
    600
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            container_runtime: false,
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            metric_prefix: String::new(),
            step: default_step(),
            dir_paths: HashMap::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    ///
    /// # Note
    /// - If the file doesn't exist, returns `ConfigError::ReadError`
    /// - Use `Config::load_or_default()` if you want fallback to defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to defaults if not found
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Validate the configuration
    ///
    /// Selector counter types are deliberately not checked here; a bad one
    /// only drops that selector's records at report time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.endpoint must not be empty".to_string(),
            ));
        }

        if self.plugin.server_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "plugin.server_name must not be empty".to_string(),
            ));
        }

        if self.plugin.step == 0 {
            return Err(ConfigError::ValidationError(
                "plugin.step must be greater than 0".to_string(),
            ));
        }

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.ttl_secs must be greater than 0".to_string(),
            ));
        }

        for (i, selector) in self.selectors.iter().enumerate() {
            if selector.object_name.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "selectors[{}].object_name must not be empty",
                    i
                )));
            }
            if selector.metrics.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "selectors[{}].metrics must not be empty",
                    i
                )));
            }
        }

        Ok(())
    }
}
