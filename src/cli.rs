//! CLI argument parsing for jmx-reporter
//!
//! This module provides the command-line interface using clap derive macros.
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: config.yaml, env: JMXR_CONFIG)
//! - `--input` / `-i`: Cycle input JSON file (env: JMXR_INPUT)
//! - `--interval`: Re-run every N seconds until interrupted (env: JMXR_INTERVAL)
//! - `--once`: Run a single cycle even if an interval is set
//! - `--endpoint`: Report endpoint identity (env: JMXR_ENDPOINT)
//! - `--container-runtime`: Container runtime mode (env: JMXR_CONTAINER_RUNTIME)
//! - `--validate`: Validate configuration and exit
//! - `--log-level` / `-l`: Log level (trace/debug/info/warn/error, env: JMXR_LOG_LEVEL)
//! - `--output-format`: Output format (text/json/yaml)
//! - `--pretty`: Pretty-print JSON output
//!
//! # Precedence
//!
//! Configuration values are resolved in the following order (highest to lowest priority):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;

/// jmx-reporter - JVM monitoring report generator
///
/// Turns management snapshots of monitored JVMs into open-falcon style
/// report records: configured selector metrics, builtin heap/non-heap/
/// metaspace/GC metrics and per-connection availability.
#[derive(Parser, Debug)]
#[command(name = "jmx-reporter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        env = "JMXR_CONFIG"
    )]
    pub config: PathBuf,

    /// Cycle input JSON (connections and snapshots)
    #[arg(short, long, value_name = "FILE", env = "JMXR_INPUT")]
    pub input: Option<PathBuf>,

    /// Re-run every N seconds until interrupted; runs once when absent
    #[arg(long, value_name = "SECS", env = "JMXR_INTERVAL")]
    pub interval: Option<u64>,

    /// Run a single cycle even if an interval is set
    #[arg(long)]
    pub once: bool,

    /// Report endpoint identity (overrides config file)
    #[arg(long, value_name = "ENDPOINT", env = "JMXR_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Container runtime mode (overrides config file)
    #[arg(long, value_name = "BOOL", env = "JMXR_CONTAINER_RUNTIME")]
    pub container_runtime: Option<bool>,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate: bool,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "JMXR_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Output format for records and --validate
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Apply CLI overrides on top of a loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.agent.endpoint = endpoint.clone();
        }
        if let Some(container_runtime) = self.container_runtime {
            config.agent.container_runtime = container_runtime;
        }
    }
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level - default
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per record
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}
