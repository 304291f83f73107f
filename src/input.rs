//! Cycle input files
//!
//! The binary reads one JSON document per cycle describing the monitored
//! connections and their snapshots. Snapshots may be given as plain
//! `{object_name, attributes}` objects, as raw Jolokia `read` responses, or
//! both.
//!
//! ```json
//! {
//!   "timestamp": 1700000000,
//!   "connections": [
//!     {
//!       "connection": { "name": "svcA", "pid": 4242, "server_name": "tomcat",
//!                       "qualified_server_name": "tomcat-4242",
//!                       "cache_key_id": "tomcat4242" },
//!       "snapshots": [
//!         { "object_name": "java.lang:type=Threading",
//!           "attributes": { "ThreadCount": 12 } }
//!       ],
//!       "jolokia": [
//!         { "request": { "mbean": "java.lang:type=Memory", "type": "read" },
//!           "value": { "HeapMemoryUsage": { "committed": 100, "used": 40, "max": 80 } },
//!           "status": 200 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::connection::Connection;
use crate::error::SnapshotError;
use crate::pipeline::MonitoredConnection;
use crate::plugin::ContainerIdCheck;
use crate::selector::MetricSelector;
use crate::snapshot::{
    parse_attribute_value, snapshots_from_jolokia_value, AttributeValue, ManagementObjectSnapshot,
    SnapshotResult,
};

/// One cycle's worth of input
#[derive(Debug, Clone, Deserialize)]
pub struct CycleInput {
    /// Report timestamp for every connection without its own
    #[serde(default)]
    pub timestamp: Option<i64>,

    #[serde(default)]
    pub connections: Vec<ConnectionInput>,

    /// Live container ids, for container runtimes
    #[serde(default)]
    pub containers: Option<Vec<String>>,
}

/// Input for one connection
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionInput {
    pub connection: Connection,

    #[serde(default)]
    pub snapshots: Vec<SnapshotInput>,

    /// Jolokia response, or array of responses
    #[serde(default)]
    pub jolokia: Option<Value>,

    /// Selectors added to the configured ones for this connection only
    #[serde(default)]
    pub selectors: Vec<MetricSelector>,

    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A snapshot in plain form
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotInput {
    pub object_name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

impl SnapshotInput {
    fn into_snapshot(self) -> SnapshotResult<ManagementObjectSnapshot> {
        let attributes = match parse_attribute_value(Value::Object(self.attributes))? {
            AttributeValue::Object(map) => map,
            _ => Default::default(),
        };
        Ok(ManagementObjectSnapshot::new(self.object_name, attributes))
    }
}

impl CycleInput {
    /// Read and parse an input file
    pub fn load<P: AsRef<Path>>(path: P) -> SnapshotResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> SnapshotResult<Self> {
        serde_json::from_str(json).map_err(|e| SnapshotError::JsonParse(e.to_string()))
    }

    /// Check for this cycle's container list
    pub fn container_check(&self) -> ContainerIdCheck {
        match &self.containers {
            Some(live) => ContainerIdCheck::new(live.iter().cloned()),
            None => ContainerIdCheck::default(),
        }
    }

    /// Build pipeline input, giving every connection `selectors` plus its own
    ///
    /// A connection whose snapshot data fails to parse is kept with no
    /// snapshots, so it still gets its availability record and the other
    /// connections are unaffected.
    pub fn into_monitored(self, selectors: &[MetricSelector]) -> Vec<MonitoredConnection> {
        let default_timestamp = self.timestamp.unwrap_or_else(unix_now);

        self.connections
            .into_iter()
            .map(|input| {
                let snapshots = match parse_snapshots(input.snapshots, input.jolokia) {
                    Ok(snapshots) => snapshots,
                    Err(e) => {
                        warn!(
                            connection = %input.connection.name,
                            error = %e,
                            "Malformed snapshot input; reporting connection without snapshots"
                        );
                        Vec::new()
                    }
                };

                let mut all_selectors = selectors.to_vec();
                all_selectors.extend(input.selectors);

                MonitoredConnection {
                    connection: input.connection,
                    snapshots,
                    selectors: all_selectors,
                    timestamp: input.timestamp.unwrap_or(default_timestamp),
                }
            })
            .collect()
    }
}

fn parse_snapshots(
    plain: Vec<SnapshotInput>,
    jolokia: Option<Value>,
) -> SnapshotResult<Vec<ManagementObjectSnapshot>> {
    let mut snapshots = plain
        .into_iter()
        .map(SnapshotInput::into_snapshot)
        .collect::<SnapshotResult<Vec<_>>>()?;
    if let Some(jolokia) = jolokia {
        snapshots.extend(snapshots_from_jolokia_value(jolokia)?);
    }
    Ok(snapshots)
}

/// Current Unix time in seconds
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
