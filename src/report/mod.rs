//! Report records and the stages that produce them
//!
//! - [`matcher`]: selector ↔ snapshot matching
//! - [`dedup`]: matched pairs → records, with same-name collision handling
//! - [`builtin`]: heap / non-heap / metaspace / GC metrics
//!
//! A [`ReportRecord`] is the unit handed to the transport layer. Its JSON form
//! is the open-falcon push payload (`endpoint`, `metric`, `timestamp`, `step`,
//! `value`, `counterType`, `tags`).

pub mod builtin;
pub mod dedup;
pub mod matcher;

pub use builtin::{BuiltinExtractor, GcExtractor};
pub use dedup::ReportDeduplicator;
pub use matcher::{MatchOutcome, MatchedPair, MetricMatcher};

use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Falcon counter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CounterType {
    #[serde(rename = "COUNTER")]
    Counter,
    #[serde(rename = "GAUGE")]
    Gauge,
}

impl CounterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterType::Counter => "COUNTER",
            CounterType::Gauge => "GAUGE",
        }
    }
}

impl fmt::Display for CounterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counter type string that is neither `COUNTER` nor `GAUGE`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid counter type '{0}', expected COUNTER or GAUGE")]
pub struct InvalidCounterType(pub String);

/// Case-sensitive, like the collector it feeds.
impl FromStr for CounterType {
    type Err = InvalidCounterType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COUNTER" => Ok(CounterType::Counter),
            "GAUGE" => Ok(CounterType::Gauge),
            other => Err(InvalidCounterType(other.to_string())),
        }
    }
}

/// Ordered tag list, rendered comma-joined.
///
/// Entries are usually `key=value`; a bare object-name may also appear when it
/// is used to tell two same-named records apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one or more comma-separated tags; empty fragments are ignored.
    pub fn append(&mut self, tags: &str) -> &mut Self {
        self.0.extend(
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
        self
    }

    /// Append `tag` as a single entry, even if it contains commas
    pub fn push(&mut self, tag: impl Into<String>) -> &mut Self {
        let tag = tag.into();
        if !tag.is_empty() {
            self.0.push(tag);
        }
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl<S: AsRef<str>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for tag in iter {
            tags.append(tag.as_ref());
        }
        tags
    }
}

impl Serialize for Tags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// One emitted observation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub endpoint: String,
    pub metric: String,
    pub timestamp: i64,
    pub step: u64,
    /// Decimal string
    pub value: String,
    pub counter_type: CounterType,
    pub tags: Tags,
    /// Source ObjectName, kept for collision tagging; empty for synthetic records
    #[serde(skip)]
    pub object_name: String,
}

/// Fields that decide whether two records describe the same observation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObservationKey {
    metric: String,
    value: String,
    tags: Tags,
    timestamp: i64,
    object_name: String,
}

impl ReportRecord {
    pub fn observation_key(&self) -> ObservationKey {
        ObservationKey {
            metric: self.metric.clone(),
            value: self.value.clone(),
            tags: self.tags.clone(),
            timestamp: self.timestamp,
            object_name: self.object_name.clone(),
        }
    }

    /// Same metric, value, tags, timestamp and object-name.
    /// Endpoint, step and counter type are not part of the identity.
    pub fn is_same_observation(&self, other: &ReportRecord) -> bool {
        self.metric == other.metric
            && self.value == other.value
            && self.tags == other.tags
            && self.timestamp == other.timestamp
            && self.object_name == other.object_name
    }

    pub fn append_tags(&mut self, tags: &str) -> &mut Self {
        self.tags.append(tags);
        self
    }
}

/// Common fields stamped on every record produced for one connection
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub endpoint: String,
    pub step: u64,
    pub timestamp: i64,
    pub metric_prefix: String,
    pub identity_tags: Tags,
    /// Connection name, used in log fields
    pub connection: String,
}

impl ReportContext {
    /// Namespaced metric name: `<prefix>.<name>`, or `name` without a prefix
    pub fn metric_name(&self, name: &str) -> String {
        if self.metric_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.metric_prefix, name)
        }
    }

    /// Build a record with this context's common fields and identity tags.
    /// `name` is namespaced through [`ReportContext::metric_name`].
    pub fn record(
        &self,
        name: &str,
        value: impl Into<String>,
        counter_type: CounterType,
        object_name: &str,
    ) -> ReportRecord {
        ReportRecord {
            endpoint: self.endpoint.clone(),
            metric: self.metric_name(name),
            timestamp: self.timestamp,
            step: self.step,
            value: value.into(),
            counter_type,
            tags: self.identity_tags.clone(),
            object_name: object_name.to_string(),
        }
    }
}

/// Insertion-ordered set of records under observation identity
#[derive(Debug, Clone, Default)]
pub struct ReportSet {
    records: Vec<ReportRecord>,
    seen: HashSet<ObservationKey>,
}

impl ReportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless an equal observation is already present
    pub fn insert(&mut self, record: ReportRecord) -> bool {
        if self.seen.insert(record.observation_key()) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, record: &ReportRecord) -> bool {
        self.seen.contains(&record.observation_key())
    }

    /// Remove the stored observation equal to `record`
    pub fn remove(&mut self, record: &ReportRecord) -> Option<ReportRecord> {
        let key = record.observation_key();
        if !self.seen.remove(&key) {
            return None;
        }
        let pos = self
            .records
            .iter()
            .position(|r| r.is_same_observation(record))?;
        Some(self.records.remove(pos))
    }

    pub fn extend<I: IntoIterator<Item = ReportRecord>>(&mut self, records: I) {
        for record in records {
            self.insert(record);
        }
    }

    /// Append `tag` to every record, keeping the identity index consistent
    /// Add `tag` as one entry on every record, commas included
    pub fn append_tag_to_all(&mut self, tag: &str) {
        for record in &mut self.records {
            record.tags.push(tag);
        }
        self.seen = self.records.iter().map(ReportRecord::observation_key).collect();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_vec(self) -> Vec<ReportRecord> {
        self.records
    }
}

impl IntoIterator for ReportSet {
    type Item = ReportRecord;
    type IntoIter = std::vec::IntoIter<ReportRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn context() -> ReportContext {
        ReportContext {
            endpoint: "host-01".to_string(),
            step: 60,
            timestamp: 1_700_000_000,
            metric_prefix: String::new(),
            identity_tags: Tags::from_iter(["service=tomcat"]),
            connection: "svcA".to_string(),
        }
    }
}
