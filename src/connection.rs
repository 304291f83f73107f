//! Monitored connections and liveness classification
//!
//! A [`Connection`] is supplied by the external connection layer every cycle.
//! [`LivenessClassifier`] decides whether the pipeline evicts it, reports only
//! its availability, or runs the full report for it.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::hook::ContainerCheck;

/// Why a connection is currently unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailabilityReason {
    /// The management connection could not be established; terminal
    ConnectionFailed,
    /// Collection timed out; retried next cycle
    Timeout,
    /// Only part of the management data arrived; retried next cycle
    PartialData,
}

impl UnavailabilityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailabilityReason::ConnectionFailed => "connection_failed",
            UnavailabilityReason::Timeout => "timeout",
            UnavailabilityReason::PartialData => "partial_data",
        }
    }
}

impl fmt::Display for UnavailabilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One monitored JVM as seen by this cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Logical name; empty or `"null"` means the connection is unidentified
    #[serde(default)]
    pub name: String,

    /// Process id; 0 when unknown
    #[serde(default)]
    pub pid: u32,

    #[serde(default)]
    pub server_name: Option<String>,

    #[serde(default)]
    pub qualified_server_name: Option<String>,

    #[serde(default = "default_true")]
    pub valid: bool,

    /// Only meaningful when `valid` is false
    #[serde(default)]
    pub unavailability: Option<UnavailabilityReason>,

    /// Whether a management connection handle exists
    #[serde(default = "default_true")]
    pub has_handle: bool,

    #[serde(default)]
    pub cache_key_id: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Connection {
    /// A valid, fully-identified connection
    pub fn valid(name: impl Into<String>, pid: u32, server_name: impl Into<String>) -> Self {
        let name = name.into();
        let server_name = server_name.into();
        Self {
            qualified_server_name: Some(format!("{}-{}", server_name, pid)),
            cache_key_id: Some(format!("{}{}", server_name, pid)),
            name,
            pid,
            server_name: Some(server_name),
            valid: true,
            unavailability: None,
            has_handle: true,
        }
    }

    /// Mark this connection unusable
    pub fn into_invalid(mut self, reason: Option<UnavailabilityReason>) -> Self {
        self.valid = false;
        self.unavailability = reason;
        self
    }

    /// Unavailability reason, enforcing that a valid connection has none
    pub fn reason(&self) -> Option<UnavailabilityReason> {
        if self.valid {
            None
        } else {
            self.unavailability
        }
    }

    /// Has a logical name at all
    pub fn is_identified(&self) -> bool {
        let name = self.name.trim();
        !name.is_empty() && name != "null"
    }

    /// Handle, cache key and qualified server name are all present
    pub fn is_reportable(&self) -> bool {
        self.has_handle
            && self.cache_key_id.as_deref().is_some_and(|id| !id.is_empty())
            && self
                .qualified_server_name
                .as_deref()
                .is_some_and(|name| !name.is_empty())
    }

    pub fn liveness(&self) -> Liveness {
        match (self.valid, self.reason()) {
            (true, _) => Liveness::Valid,
            (false, Some(UnavailabilityReason::ConnectionFailed)) => {
                Liveness::UnavailableTerminal(Some(UnavailabilityReason::ConnectionFailed))
            }
            (false, Some(reason)) => Liveness::UnavailableRetryable(reason),
            (false, None) => Liveness::UnavailableTerminal(None),
        }
    }
}

/// Liveness state of a connection in this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Valid,
    /// Invalid for a transient reason
    UnavailableRetryable(UnavailabilityReason),
    /// Connection failed, or was never usable
    UnavailableTerminal(Option<UnavailabilityReason>),
}

impl Liveness {
    /// Whether selector and builtin metrics are produced this cycle
    pub fn continues_reporting(&self) -> bool {
        matches!(self, Liveness::Valid | Liveness::UnavailableRetryable(_))
    }
}

/// Why a connection was evicted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictReason {
    /// No usable logical name
    Unidentified,
    /// Invalid connection whose container is gone
    ContainerGone,
    /// Invalid connection whose install directory no longer exists
    DirectoryMissing(String),
}

impl fmt::Display for EvictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictReason::Unidentified => f.write_str("connection has no name"),
            EvictReason::ContainerGone => f.write_str("container no longer exists"),
            EvictReason::DirectoryMissing(path) => {
                write!(f, "install directory '{}' no longer exists", path)
            }
        }
    }
}

/// Outcome of the liveness gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Drop the connection and its cached directory entries
    Evict(EvictReason),
    /// Keep the connection; report according to its liveness
    Report(Liveness),
}

/// Classifies a connection against its environment
pub struct LivenessClassifier<'a> {
    container_runtime: bool,
    containers: &'a dyn ContainerCheck,
}

impl<'a> LivenessClassifier<'a> {
    pub fn new(container_runtime: bool, containers: &'a dyn ContainerCheck) -> Self {
        Self {
            container_runtime,
            containers,
        }
    }

    /// Decide the gate for `connection`.
    ///
    /// `install_dir` is the resolved install directory (non-container mode
    /// only); it is consulted only for invalid connections.
    pub fn classify(&self, connection: &Connection, install_dir: Option<&str>) -> Gate {
        if !connection.is_identified() {
            return Gate::Evict(EvictReason::Unidentified);
        }

        if !connection.valid {
            if self.container_runtime {
                if !self.containers.container_exists(&connection.name) {
                    return Gate::Evict(EvictReason::ContainerGone);
                }
            } else if let Some(dir) = install_dir.filter(|d| !d.is_empty()) {
                if connection.pid != 0
                    && connection.server_name.is_some()
                    && !Path::new(dir).exists()
                {
                    return Gate::Evict(EvictReason::DirectoryMissing(dir.to_string()));
                }
            }
        }

        Gate::Report(connection.liveness())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Containers(bool);

    impl ContainerCheck for Containers {
        fn container_exists(&self, _connection_name: &str) -> bool {
            self.0
        }
    }

    #[test]
    fn test_liveness_states() {
        let conn = Connection::valid("svcA", 100, "tomcat");
        assert_eq!(conn.liveness(), Liveness::Valid);

        let failed = conn.clone().into_invalid(Some(UnavailabilityReason::ConnectionFailed));
        assert!(!failed.liveness().continues_reporting());

        let timeout = conn.clone().into_invalid(Some(UnavailabilityReason::Timeout));
        assert_eq!(
            timeout.liveness(),
            Liveness::UnavailableRetryable(UnavailabilityReason::Timeout)
        );
        assert!(timeout.liveness().continues_reporting());

        let never = conn.into_invalid(None);
        assert_eq!(never.liveness(), Liveness::UnavailableTerminal(None));
    }

    #[test]
    fn test_valid_connection_ignores_reason() {
        let mut conn = Connection::valid("svcA", 100, "tomcat");
        conn.unavailability = Some(UnavailabilityReason::Timeout);
        assert_eq!(conn.reason(), None);
        assert_eq!(conn.liveness(), Liveness::Valid);
    }

    #[test]
    fn test_reportable_requires_handle_key_and_name() {
        let conn = Connection::valid("svcA", 100, "tomcat");
        assert!(conn.is_reportable());

        let mut no_handle = conn.clone();
        no_handle.has_handle = false;
        assert!(!no_handle.is_reportable());

        let mut no_key = conn.clone();
        no_key.cache_key_id = None;
        assert!(!no_key.is_reportable());

        let mut no_qualified = conn;
        no_qualified.qualified_server_name = Some(String::new());
        assert!(!no_qualified.is_reportable());
    }

    #[test]
    fn test_unidentified_evicted() {
        let check = Containers(true);
        let classifier = LivenessClassifier::new(false, &check);

        for name in ["", "null", "  "] {
            let conn = Connection::valid(name, 1, "tomcat");
            assert_eq!(
                classifier.classify(&conn, None),
                Gate::Evict(EvictReason::Unidentified)
            );
        }
    }

    #[test]
    fn test_container_gone_evicts_only_invalid() {
        let gone = Containers(false);
        let classifier = LivenessClassifier::new(true, &gone);

        let valid = Connection::valid("svcA", 1, "tomcat");
        assert_eq!(classifier.classify(&valid, None), Gate::Report(Liveness::Valid));

        let invalid = valid.into_invalid(Some(UnavailabilityReason::Timeout));
        assert_eq!(
            classifier.classify(&invalid, None),
            Gate::Evict(EvictReason::ContainerGone)
        );
    }

    #[test]
    fn test_missing_directory_evicts() {
        let check = Containers(true);
        let classifier = LivenessClassifier::new(false, &check);
        let conn = Connection::valid("svcA", 4242, "tomcat")
            .into_invalid(Some(UnavailabilityReason::ConnectionFailed));

        let missing = "/nonexistent/jmx-reporter/tomcat";
        assert_eq!(
            classifier.classify(&conn, Some(missing)),
            Gate::Evict(EvictReason::DirectoryMissing(missing.to_string()))
        );

        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().to_string_lossy().to_string();
        assert_eq!(
            classifier.classify(&conn, Some(&existing)),
            Gate::Report(Liveness::UnavailableTerminal(Some(
                UnavailabilityReason::ConnectionFailed
            )))
        );

        // an unresolved directory never evicts
        assert!(matches!(classifier.classify(&conn, None), Gate::Report(_)));
    }

    #[test]
    fn test_deserialize_defaults() {
        let conn: Connection = serde_json::from_str(r#"{"name": "svcA", "pid": 7}"#).unwrap();
        assert!(conn.valid);
        assert!(conn.has_handle);
        assert!(conn.server_name.is_none());
        assert!(!conn.is_reportable());

        let invalid: Connection = serde_json::from_str(
            r#"{"name": "svcA", "valid": false, "unavailability": "partial_data"}"#,
        )
        .unwrap();
        assert_eq!(invalid.reason(), Some(UnavailabilityReason::PartialData));
    }
}
