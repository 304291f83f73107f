//! Configured metric selectors
//!
//! A selector names one MBean attribute to report: which ObjectName it lives
//! under (substring match), which attribute key to read, what to call it, and
//! how to post-process it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One configured metric request
///
/// # Example Configuration (YAML)
///
/// ```yaml
/// - object_name: "java.lang:type=Threading"
///   metrics: ThreadCount
///   alias: threads.count
///   counter_type: GAUGE
///   value_expression: "value * 1"
///   tag: "group=threads"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricSelector {
    /// Substring that the snapshot's ObjectName must contain
    pub object_name: String,

    /// Attribute key to read the value from
    pub metrics: String,

    /// Reported metric name; falls back to `metrics` when empty
    #[serde(default)]
    pub alias: String,

    /// `COUNTER` or `GAUGE`; validated per record, not at load time
    #[serde(default = "default_counter_type")]
    pub counter_type: String,

    /// Optional value expression applied to the raw value
    #[serde(default)]
    pub value_expression: Option<String>,

    /// Optional static tag(s), comma-separated `key=value`
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_counter_type() -> String {
    "GAUGE".to_string()
}

impl MetricSelector {
    /// Create a selector with no expression and no tag
    pub fn new(
        object_name: impl Into<String>,
        metrics: impl Into<String>,
        alias: impl Into<String>,
        counter_type: impl Into<String>,
    ) -> Self {
        Self {
            object_name: object_name.into(),
            metrics: metrics.into(),
            alias: alias.into(),
            counter_type: counter_type.into(),
            value_expression: None,
            tag: None,
        }
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.value_expression = Some(expression.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Effective reported name
    pub fn alias(&self) -> &str {
        if self.alias.is_empty() {
            &self.metrics
        } else {
            &self.alias
        }
    }
}

/// `[metrics: X, alias: Y]`, the form used in collection diagnostics
impl fmt::Display for MetricSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[metrics: {}, alias: {}]", self.metrics, self.alias())
    }
}
