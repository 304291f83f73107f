//! Selector ↔ snapshot matching
//!
//! A snapshot satisfies a selector when its ObjectName contains the selector's
//! pattern and it exposes a non-null value under the selector's metric key or
//! alias key. Which selectors were satisfied is tracked in a side table built
//! fresh for every call, so configuration is never mutated.

use std::collections::HashSet;

use tracing::warn;

use crate::selector::MetricSelector;
use crate::snapshot::ManagementObjectSnapshot;

/// A snapshot that satisfied a selector
#[derive(Debug, Clone, Copy)]
pub struct MatchedPair<'a> {
    pub snapshot: &'a ManagementObjectSnapshot,
    pub selector: &'a MetricSelector,
}

/// Matching result for one connection in one cycle
#[derive(Debug)]
pub struct MatchOutcome<'a> {
    /// Unique pairs, in selector order then snapshot order
    pub pairs: Vec<MatchedPair<'a>>,
    selectors: &'a [MetricSelector],
    collected: Vec<bool>,
}

impl<'a> MatchOutcome<'a> {
    /// Selectors satisfied by at least one snapshot
    pub fn collected(&self) -> impl Iterator<Item = &'a MetricSelector> + '_ {
        self.selectors
            .iter()
            .zip(&self.collected)
            .filter(|(_, hit)| **hit)
            .map(|(s, _)| s)
    }

    /// Selectors no snapshot satisfied
    pub fn uncollected(&self) -> impl Iterator<Item = &'a MetricSelector> + '_ {
        self.selectors
            .iter()
            .zip(&self.collected)
            .filter(|(_, hit)| !**hit)
            .map(|(s, _)| s)
    }

    /// Log collected/uncollected selectors for `connection`
    pub fn log_diagnostics(&self, connection: &str) {
        let uncollected: Vec<String> = self.uncollected().map(|s| s.to_string()).collect();
        let collected: Vec<String> = self.collected().map(|s| s.to_string()).collect();

        if !uncollected.is_empty() {
            warn!(
                connection = %connection,
                count = uncollected.len(),
                selectors = %uncollected.join(" "),
                "Metrics not collected this cycle"
            );
        }
        warn!(
            connection = %connection,
            count = collected.len(),
            selectors = %collected.join(" "),
            "Metrics collected this cycle"
        );
    }
}

/// Matches configured selectors against live snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricMatcher;

impl MetricMatcher {
    /// Does `snapshot` satisfy `selector`?
    pub fn matches(selector: &MetricSelector, snapshot: &ManagementObjectSnapshot) -> bool {
        snapshot.object_name.contains(&selector.object_name)
            && (snapshot.attribute(&selector.metrics).is_some()
                || snapshot.attribute(selector.alias()).is_some())
    }

    /// Match every selector against every snapshot.
    ///
    /// Identical selectors configured twice yield one pair per snapshot.
    pub fn match_all<'a>(
        selectors: &'a [MetricSelector],
        snapshots: &'a [ManagementObjectSnapshot],
    ) -> MatchOutcome<'a> {
        let mut collected = vec![false; selectors.len()];
        let mut seen: HashSet<(usize, &MetricSelector)> = HashSet::new();
        let mut pairs = Vec::new();

        for (i, selector) in selectors.iter().enumerate() {
            for (j, snapshot) in snapshots.iter().enumerate() {
                if !Self::matches(selector, snapshot) {
                    continue;
                }
                collected[i] = true;
                if seen.insert((j, selector)) {
                    pairs.push(MatchedPair { snapshot, selector });
                }
            }
        }

        MatchOutcome {
            pairs,
            selectors,
            collected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::AttributeValue;
    use std::collections::HashMap;

    fn snapshot(name: &str, attrs: &[(&str, AttributeValue)]) -> ManagementObjectSnapshot {
        ManagementObjectSnapshot::new(
            name,
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_match_requires_name_and_attribute() {
        let selector = MetricSelector::new("type=Threading", "ThreadCount", "threads", "GAUGE");

        let hit = snapshot("java.lang:type=Threading", &[("ThreadCount", AttributeValue::Integer(4))]);
        let wrong_name = snapshot("java.lang:type=Memory", &[("ThreadCount", AttributeValue::Integer(4))]);
        let wrong_attr = snapshot("java.lang:type=Threading", &[("PeakThreadCount", AttributeValue::Integer(4))]);
        let null_attr = snapshot("java.lang:type=Threading", &[("ThreadCount", AttributeValue::Null)]);

        assert!(MetricMatcher::matches(&selector, &hit));
        assert!(!MetricMatcher::matches(&selector, &wrong_name));
        assert!(!MetricMatcher::matches(&selector, &wrong_attr));
        assert!(!MetricMatcher::matches(&selector, &null_attr));
    }

    #[test]
    fn test_match_via_alias_key() {
        let selector = MetricSelector::new("type=Threading", "ThreadCount", "Threads", "GAUGE");
        let by_alias = snapshot("java.lang:type=Threading", &[("Threads", AttributeValue::Integer(4))]);
        assert!(MetricMatcher::matches(&selector, &by_alias));
    }

    #[test]
    fn test_collected_side_table() {
        let selectors = vec![
            MetricSelector::new("type=Threading", "ThreadCount", "threads", "GAUGE"),
            MetricSelector::new("type=ClassLoading", "LoadedClassCount", "classes", "GAUGE"),
        ];
        let snapshots = vec![snapshot(
            "java.lang:type=Threading",
            &[("ThreadCount", AttributeValue::Integer(4))],
        )];

        let outcome = MetricMatcher::match_all(&selectors, &snapshots);
        assert_eq!(outcome.pairs.len(), 1);

        let collected: Vec<&str> = outcome.collected().map(|s| s.alias()).collect();
        let uncollected: Vec<&str> = outcome.uncollected().map(|s| s.alias()).collect();
        assert_eq!(collected, vec!["threads"]);
        assert_eq!(uncollected, vec!["classes"]);
    }

    #[test]
    fn test_duplicate_selectors_collapse() {
        let selector = MetricSelector::new("type=Threading", "ThreadCount", "threads", "GAUGE");
        let selectors = vec![selector.clone(), selector];
        let snapshots = vec![snapshot(
            "java.lang:type=Threading",
            &[("ThreadCount", AttributeValue::Integer(4))],
        )];

        let outcome = MetricMatcher::match_all(&selectors, &snapshots);
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.collected().count(), 2);
    }

    #[test]
    fn test_one_selector_many_snapshots() {
        let selectors = vec![MetricSelector::new("type=MemoryPool", "CollectionUsageThresholdCount", "", "GAUGE")];
        let snapshots = vec![
            snapshot(
                "java.lang:type=MemoryPool,name=PS Eden Space",
                &[("CollectionUsageThresholdCount", AttributeValue::Integer(1))],
            ),
            snapshot(
                "java.lang:type=MemoryPool,name=PS Old Gen",
                &[("CollectionUsageThresholdCount", AttributeValue::Integer(2))],
            ),
        ];

        let outcome = MetricMatcher::match_all(&selectors, &snapshots);
        assert_eq!(outcome.pairs.len(), 2);
        assert_eq!(outcome.pairs[0].snapshot.object_name, "java.lang:type=MemoryPool,name=PS Eden Space");
    }
}
