//! Default hook implementations used by the binary

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::PluginConfig;
use crate::connection::Connection;
use crate::hook::{ConnectionLifecycle, ContainerCheck, PluginHook};

/// Config-driven plugin hook
///
/// Directory paths come from the static `dir_paths` map and fall back to the
/// process's working directory (`/proc/<pid>/cwd`).
#[derive(Debug, Clone)]
pub struct ConfiguredPlugin {
    server_name: String,
    metric_prefix: String,
    step: u64,
    dir_paths: HashMap<u32, String>,
    proc_root: String,
}

impl ConfiguredPlugin {
    pub fn from_config(config: &PluginConfig) -> Self {
        Self {
            server_name: config.server_name.clone(),
            metric_prefix: config.metric_prefix.clone(),
            step: config.step,
            dir_paths: config.dir_paths.clone(),
            proc_root: "/proc".to_string(),
        }
    }

    /// Use another procfs mount for the cwd fallback
    pub fn with_proc_root(mut self, proc_root: impl Into<String>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    fn dir_path(&self, pid: u32) -> Option<String> {
        if let Some(path) = self.dir_paths.get(&pid) {
            return Some(path.clone());
        }
        if pid == 0 {
            return None;
        }

        let link = Path::new(&self.proc_root).join(pid.to_string()).join("cwd");
        match std::fs::read_link(&link) {
            Ok(target) => Some(target.to_string_lossy().into_owned()),
            Err(e) => {
                debug!(pid, link = %link.display(), error = %e, "No working directory for process");
                None
            }
        }
    }
}

impl PluginHook for ConfiguredPlugin {
    fn step(&self) -> u64 {
        self.step
    }

    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn metric_prefix(&self) -> &str {
        &self.metric_prefix
    }

    fn server_dir_name(&self, pid: u32) -> Option<String> {
        let path = self.dir_path(pid)?;
        Path::new(path.trim_end_matches('/'))
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    fn server_dir_path(&self, pid: u32, _server_name: &str) -> Option<String> {
        self.dir_path(pid)
    }
}

static CONTAINER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9a-f]{12}\b").expect("invalid container id regex"));

/// Container check backed by a list of live container ids
///
/// A connection name is mapped to a container by the first 12-hex-digit
/// short id it contains. Names without an id, and every name when no list
/// was given (`Default`), are assumed to be alive.
#[derive(Debug, Clone, Default)]
pub struct ContainerIdCheck {
    live: Option<Vec<String>>,
}

impl ContainerIdCheck {
    pub fn new<I, S>(live: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            live: Some(live.into_iter().map(Into::into).collect()),
        }
    }

    /// Short container id embedded in `name`
    pub fn container_id(name: &str) -> Option<&str> {
        CONTAINER_ID_RE.find(name).map(|m| m.as_str())
    }
}

impl ContainerCheck for ContainerIdCheck {
    fn container_exists(&self, connection_name: &str) -> bool {
        let Some(live) = &self.live else {
            return true;
        };
        match Self::container_id(connection_name) {
            Some(id) => live.iter().any(|live| live.starts_with(id)),
            None => true,
        }
    }
}

/// Lifecycle that only records evictions in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLifecycle;

impl ConnectionLifecycle for LoggingLifecycle {
    fn remove_connection(&self, connection: &Connection) {
        info!(
            connection = %connection.name,
            pid = connection.pid,
            server = connection.server_name.as_deref().unwrap_or(""),
            "Removing connection"
        );
    }
}
