//! Matched pairs → report records
//!
//! Several snapshots can satisfy one selector (or several selectors can share
//! an alias), which yields records with the same metric name. Records are
//! grouped by that emitted name and each group is resolved on its own:
//!
//! - the first record of a group is kept as-is
//! - a later record identical to the first one is dropped
//! - on the first divergent record, the first record is re-tagged with its own
//!   object-name, and every divergent record is tagged with its own object-name
//!   before it is added
//!
//! Each record carries its object-name tag at most once, and which records
//! survive does not depend on iteration order within the input beyond "first".

use std::collections::HashMap;
use std::sync::Arc;

use tracing::error;

use crate::metrics::PipelineMetrics;
use crate::report::{CounterType, ReportContext, ReportRecord, ReportSet};
use crate::report::matcher::MatchedPair;
use crate::transformer::ValueTransformer;

/// Converts matched pairs into a de-duplicated record set
#[derive(Debug, Clone)]
pub struct ReportDeduplicator {
    transformer: ValueTransformer,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl ReportDeduplicator {
    pub fn new(transformer: ValueTransformer) -> Self {
        Self {
            transformer,
            metrics: None,
        }
    }

    /// Count dropped records in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build records for every pair and resolve same-name collisions
    pub fn convert(&self, pairs: &[MatchedPair<'_>], ctx: &ReportContext) -> ReportSet {
        let mut groups: Vec<Vec<ReportRecord>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for pair in pairs {
            let Some(record) = self.build_record(pair, ctx) else {
                continue;
            };
            match index.get(&record.metric) {
                Some(&slot) => groups[slot].push(record),
                None => {
                    index.insert(record.metric.clone(), groups.len());
                    groups.push(vec![record]);
                }
            }
        }

        let mut out = ReportSet::new();
        for group in groups {
            resolve_group(group, &mut out);
        }
        out
    }

    fn build_record(&self, pair: &MatchedPair<'_>, ctx: &ReportContext) -> Option<ReportRecord> {
        let selector = pair.selector;
        let snapshot = pair.snapshot;

        // Matched through the alias key only; there is no value to report.
        let raw = snapshot.attribute(&selector.metrics)?.to_string();

        let counter_type = match selector.counter_type.parse::<CounterType>() {
            Ok(counter_type) => counter_type,
            Err(e) => {
                error!(
                    connection = %ctx.connection,
                    object_name = %snapshot.object_name,
                    metric = %selector.alias(),
                    error = %e,
                    "Dropping metric with invalid counter type"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.dropped_counter_type_total.inc();
                }
                return None;
            }
        };

        let value = match self
            .transformer
            .transform(selector.value_expression.as_deref(), &raw)
        {
            Ok(value) => value,
            Err(e) => {
                error!(
                    connection = %ctx.connection,
                    object_name = %snapshot.object_name,
                    metric = %selector.alias(),
                    raw = %raw,
                    error = %e,
                    "Dropping metric with non-numeric value"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.dropped_non_numeric_total.inc();
                }
                return None;
            }
        };

        let mut record = ctx.record(selector.alias(), value, counter_type, &snapshot.object_name);
        if let Some(tag) = &selector.tag {
            record.append_tags(tag);
        }
        Some(record)
    }
}

impl Default for ReportDeduplicator {
    fn default() -> Self {
        Self::new(ValueTransformer::default())
    }
}

fn resolve_group(group: Vec<ReportRecord>, out: &mut ReportSet) {
    let mut records = group.into_iter();
    let Some(mut first) = records.next() else {
        return;
    };
    out.insert(first.clone());

    let mut first_tagged = false;
    for mut record in records {
        if record.is_same_observation(&first) {
            continue;
        }
        if !first_tagged {
            out.remove(&first);
            let own = first.object_name.clone();
            first.tags.push(own);
            out.insert(first.clone());
            first_tagged = true;
        }
        let own = record.object_name.clone();
        record.tags.push(own);
        out.insert(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::matcher::MetricMatcher;
    use crate::report::test_support::context;
    use crate::selector::MetricSelector;
    use crate::snapshot::{AttributeValue, ManagementObjectSnapshot};
    use std::collections::HashMap;

    fn snapshot(name: &str, key: &str, value: AttributeValue) -> ManagementObjectSnapshot {
        ManagementObjectSnapshot::new(name, HashMap::from([(key.to_string(), value)]))
    }

    fn convert(selectors: &[MetricSelector], snapshots: &[ManagementObjectSnapshot]) -> Vec<ReportRecord> {
        let outcome = MetricMatcher::match_all(selectors, snapshots);
        ReportDeduplicator::default()
            .convert(&outcome.pairs, &context())
            .into_vec()
    }

    #[test]
    fn test_single_record_untagged() {
        let selectors = vec![MetricSelector::new("type=Threading", "ThreadCount", "threads", "GAUGE")];
        let snapshots = vec![snapshot("java.lang:type=Threading", "ThreadCount", AttributeValue::Integer(12))];

        let records = convert(&selectors, &snapshots);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric, "threads");
        assert_eq!(records[0].value, "12");
        assert_eq!(records[0].tags.to_string(), "service=tomcat");
    }

    #[test]
    fn test_identical_values_collapse() {
        // two selectors with the same alias over one snapshot, equal values
        let selectors = vec![
            MetricSelector::new("type=Threading", "ThreadCount", "threads", "GAUGE"),
            MetricSelector::new("java.lang:type=Threading", "ThreadCount", "threads", "GAUGE"),
        ];
        let snapshots = vec![snapshot("java.lang:type=Threading", "ThreadCount", AttributeValue::Integer(12))];

        let records = convert(&selectors, &snapshots);
        assert_eq!(records.len(), 1);
        assert!(!records[0].tags.contains("java.lang:type=Threading"));
    }

    #[test]
    fn test_divergent_values_are_tagged() {
        let selectors = vec![MetricSelector::new("type=MemoryPool", "UsageThresholdCount", "pool.threshold", "GAUGE")];
        let snapshots = vec![
            snapshot("java.lang:type=MemoryPool,name=Eden", "UsageThresholdCount", AttributeValue::Integer(1)),
            snapshot("java.lang:type=MemoryPool,name=Old", "UsageThresholdCount", AttributeValue::Integer(2)),
            snapshot("java.lang:type=MemoryPool,name=Perm", "UsageThresholdCount", AttributeValue::Integer(3)),
        ];

        let records = convert(&selectors, &snapshots);
        assert_eq!(records.len(), 3);
        for record in &records {
            let own = record.object_name.as_str();
            assert_eq!(record.tags.iter().filter(|t| *t == own).count(), 1);
        }
        let values: Vec<&str> = records.iter().map(|r| r.value.as_str()).collect();
        assert!(values.contains(&"1") && values.contains(&"2") && values.contains(&"3"));
    }

    #[test]
    fn test_invalid_counter_type_dropped() {
        let metrics = Arc::new(PipelineMetrics::new());
        let selectors = vec![
            MetricSelector::new("type=Threading", "ThreadCount", "threads", "BOGUS"),
            MetricSelector::new("type=Threading", "DaemonThreadCount", "daemons", "GAUGE"),
        ];
        let snapshots = vec![ManagementObjectSnapshot::new("java.lang:type=Threading", HashMap::new())
            .with_attribute("ThreadCount", AttributeValue::Integer(12))
            .with_attribute("DaemonThreadCount", AttributeValue::Integer(3))];

        let outcome = MetricMatcher::match_all(&selectors, &snapshots);
        let records = ReportDeduplicator::default()
            .with_metrics(metrics.clone())
            .convert(&outcome.pairs, &context())
            .into_vec();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric, "daemons");
        assert_eq!(metrics.dropped_counter_type_total.get(), 1);
    }

    #[test]
    fn test_non_numeric_value_dropped() {
        let metrics = Arc::new(PipelineMetrics::new());
        let selectors = vec![MetricSelector::new("type=Runtime", "VmVendor", "vendor", "GAUGE")];
        let snapshots = vec![snapshot(
            "java.lang:type=Runtime",
            "VmVendor",
            AttributeValue::String("Oracle".to_string()),
        )];

        let outcome = MetricMatcher::match_all(&selectors, &snapshots);
        let records = ReportDeduplicator::default()
            .with_metrics(metrics.clone())
            .convert(&outcome.pairs, &context());

        assert!(records.is_empty());
        assert_eq!(metrics.dropped_non_numeric_total.get(), 1);
    }

    #[test]
    fn test_expression_and_tag_applied() {
        let selectors = vec![MetricSelector::new("type=Threading", "ThreadCount", "threads", "COUNTER")
            .with_expression("value * 2")
            .with_tag("group=threads")];
        let snapshots = vec![snapshot("java.lang:type=Threading", "ThreadCount", AttributeValue::Integer(21))];

        let records = convert(&selectors, &snapshots);
        assert_eq!(records[0].value, "42");
        assert_eq!(records[0].counter_type, CounterType::Counter);
        assert_eq!(records[0].tags.to_string(), "service=tomcat,group=threads");
    }

    #[test]
    fn test_alias_only_match_skipped() {
        let selectors = vec![MetricSelector::new("type=Threading", "ThreadCount", "Threads", "GAUGE")];
        let snapshots = vec![snapshot("java.lang:type=Threading", "Threads", AttributeValue::Integer(5))];

        assert!(convert(&selectors, &snapshots).is_empty());
    }

    #[test]
    fn test_resolve_group_tags_once() {
        let ctx = context();
        let a = ctx.record("m", "1", CounterType::Gauge, "x:name=a");
        let b = ctx.record("m", "2", CounterType::Gauge, "x:name=b");
        let c = ctx.record("m", "3", CounterType::Gauge, "x:name=c");

        let mut out = ReportSet::new();
        resolve_group(vec![a, b, c], &mut out);

        let records = out.into_vec();
        assert_eq!(records.len(), 3);
        let first = records.iter().find(|r| r.value == "1").unwrap();
        assert_eq!(first.tags.iter().filter(|t| *t == "x:name=a").count(), 1);
    }
}
