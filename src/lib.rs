//! jmx-reporter library
//!
//! This crate turns management snapshots of monitored JVMs into
//! open-falcon style report records. One report cycle gates every
//! connection on liveness, resolves install-directory metadata through
//! TTL caches, matches configured selectors against the snapshots,
//! de-duplicates the results and appends builtin memory and GC metrics.

pub mod cache;
pub mod cli;
pub mod config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod hook;
pub mod input;
pub mod metrics;
pub mod pipeline;
pub mod plugin;
pub mod report;
pub mod selector;
pub mod snapshot;
pub mod transformer;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging subsystem
///
/// Logs go to stderr so that stdout carries only report output.
///
/// # Arguments
/// * `level` - Log level string (trace, debug, info, warn, error)
///
/// # Errors
/// Returns an error if the logging system fails to initialize
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
