//! Plugin hook surface
//!
//! Seams where the pipeline calls out to its host: naming and step metadata,
//! directory lookups, connection teardown and container checks.

use crate::connection::Connection;
use crate::pipeline::MonitoredConnection;
use crate::report::{ReportContext, ReportRecord, Tags};

/// Placeholder name given to connections of plugins that do not sign them.
/// It is never reported as a tag.
pub const NO_NAME: &str = "NO NAME";

/// Per-plugin metadata and lookups
pub trait PluginHook: Send + Sync {
    /// Reporting interval in seconds
    fn step(&self) -> u64;

    /// Server identity used in the `service` tag
    fn server_name(&self) -> &str;

    /// Namespace prepended to metric names (`<prefix>.<name>`)
    fn metric_prefix(&self) -> &str {
        ""
    }

    /// Identity tags for a connection
    fn identity_tags(&self, connection_name: &str) -> Tags {
        let mut tags = Tags::new();
        tags.append(&format!("service={}", self.server_name()));
        if !connection_name.is_empty() && connection_name != NO_NAME {
            tags.append(&format!("agentSignName={}", connection_name));
        }
        tags
    }

    /// Short directory name of the process, for the `dir` tag
    fn server_dir_name(&self, pid: u32) -> Option<String>;

    /// Install directory of the process
    fn server_dir_path(&self, pid: u32, server_name: &str) -> Option<String>;

    /// Plugin-specific records merged into an eligible connection's report
    fn inbuilt_reports(&self, _connection: &MonitoredConnection, _ctx: &ReportContext) -> Vec<ReportRecord> {
        Vec::new()
    }
}

/// Drops the underlying connection of an evicted connection
pub trait ConnectionLifecycle: Send + Sync {
    fn remove_connection(&self, connection: &Connection);
}

/// Container runtime lookup
pub trait ContainerCheck: Send + Sync {
    /// Does the container backing `connection_name` still exist?
    fn container_exists(&self, connection_name: &str) -> bool;
}
