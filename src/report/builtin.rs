//! 내장 JVM 메트릭 추출
//!
//! 셀렉터 설정과 무관하게 항상 보고되는 메트릭입니다.
//!
//! - `java.lang:type=Memory` → Heap / NonHeap 사용량
//! - `java.lang:type=MemoryPool,name=Metaspace` → Metaspace 사용량
//! - `java.lang:type=GarbageCollector,*` → GC 횟수 / 누적 시간
//!
//! 모든 내장 레코드는 GAUGE이며 식별 태그만 가집니다.

use tracing::{debug, error, warn};

use crate::error::ExtractError;
use crate::metrics::PipelineMetrics;
use crate::report::{CounterType, ReportContext, ReportRecord};
use crate::snapshot::{ManagementObjectSnapshot, MemoryUsage, ObjectName};

/// UsedRatio sentinel when no ratio can be computed
const NO_RATIO: &str = "-1";

/// Heap / non-heap / metaspace extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinExtractor;

impl BuiltinExtractor {
    /// Extract memory records from this cycle's snapshots.
    ///
    /// Arithmetic failures are logged and the records computed so far are
    /// kept.
    pub fn extract(ctx: &ReportContext, snapshots: &[ManagementObjectSnapshot]) -> Vec<ReportRecord> {
        Self::extract_counting(ctx, snapshots).0
    }

    /// Same as [`extract`](Self::extract), counting failures in `metrics`
    pub fn extract_with_metrics(
        ctx: &ReportContext,
        snapshots: &[ManagementObjectSnapshot],
        metrics: &PipelineMetrics,
    ) -> Vec<ReportRecord> {
        let (records, failures) = Self::extract_counting(ctx, snapshots);
        metrics.extract_errors_total.inc_by(failures as u64);
        records
    }

    fn extract_counting(
        ctx: &ReportContext,
        snapshots: &[ManagementObjectSnapshot],
    ) -> (Vec<ReportRecord>, usize) {
        let mut out = Vec::new();
        let mut failures = 0;
        let mut saw_memory = false;
        let mut saw_metaspace = false;

        for snapshot in snapshots {
            let Some(name) = snapshot.parsed_name() else {
                continue;
            };

            let result = if name.is("java.lang", &[("type", "Memory")]) {
                saw_memory = true;
                Self::memory(ctx, snapshot, &mut out)
            } else if name.is("java.lang", &[("type", "MemoryPool"), ("name", "Metaspace")]) {
                saw_metaspace = true;
                Self::metaspace(ctx, snapshot, &mut out)
            } else {
                Ok(())
            };

            if let Err(e) = result {
                failures += 1;
                error!(
                    connection = %ctx.connection,
                    object_name = %snapshot.object_name,
                    error = %e,
                    "Builtin extraction failed"
                );
            }
        }

        if !saw_memory {
            warn!(connection = %ctx.connection, "No java.lang:type=Memory object in snapshot");
        }
        if !saw_metaspace {
            warn!(connection = %ctx.connection, "No Metaspace memory pool in snapshot");
        }

        (out, failures)
    }

    fn memory(
        ctx: &ReportContext,
        snapshot: &ManagementObjectSnapshot,
        out: &mut Vec<ReportRecord>,
    ) -> Result<(), ExtractError> {
        if let Some(heap) = Self::usage(snapshot, "HeapMemoryUsage") {
            let object_name = snapshot.object_name.as_str();
            let free = checked_sub(heap.max, heap.used, "HeapMemoryFree")?;
            let ratio = used_ratio(heap.used, heap.max, "HeapMemoryUsedRatio")?;

            push(out, ctx, "HeapMemoryCommitted", heap.committed.to_string(), object_name);
            push(out, ctx, "HeapMemoryFree", free.to_string(), object_name);
            push(out, ctx, "HeapMemoryMax", heap.max.to_string(), object_name);
            push(out, ctx, "HeapMemoryUsed", heap.used.to_string(), object_name);
            push(
                out,
                ctx,
                "HeapMemoryUsedRatio",
                ratio.unwrap_or_else(|| NO_RATIO.to_string()),
                object_name,
            );
        }

        if let Some(non_heap) = Self::usage(snapshot, "NonHeapMemoryUsage") {
            Self::pool(ctx, "NonHeapMemory", non_heap, &snapshot.object_name, out)?;
        }

        Ok(())
    }

    fn metaspace(
        ctx: &ReportContext,
        snapshot: &ManagementObjectSnapshot,
        out: &mut Vec<ReportRecord>,
    ) -> Result<(), ExtractError> {
        match Self::usage(snapshot, "Usage") {
            Some(usage) => Self::pool(ctx, "MetaspaceMemory", usage, &snapshot.object_name, out),
            None => Ok(()),
        }
    }

    /// Committed, Used, then either the unbounded sentinel or Ratio/Max/Free
    fn pool(
        ctx: &ReportContext,
        prefix: &str,
        usage: MemoryUsage,
        object_name: &str,
        out: &mut Vec<ReportRecord>,
    ) -> Result<(), ExtractError> {
        let name = |suffix: &str| format!("{prefix}{suffix}");

        push(out, ctx, &name("Committed"), usage.committed.to_string(), object_name);
        push(out, ctx, &name("Used"), usage.used.to_string(), object_name);

        if usage.is_unbounded() {
            push(out, ctx, &name("UsedRatio"), NO_RATIO.to_string(), object_name);
            return Ok(());
        }

        let ratio = used_ratio(usage.used, usage.max, &name("UsedRatio"))?;
        let free = checked_sub(usage.max, usage.used, &name("Free"))?;
        push(
            out,
            ctx,
            &name("UsedRatio"),
            ratio.unwrap_or_else(|| NO_RATIO.to_string()),
            object_name,
        );
        push(out, ctx, &name("Max"), usage.max.to_string(), object_name);
        push(out, ctx, &name("Free"), free.to_string(), object_name);
        Ok(())
    }

    fn usage(snapshot: &ManagementObjectSnapshot, attribute: &str) -> Option<MemoryUsage> {
        let usage = snapshot.attribute(attribute).and_then(MemoryUsage::from_attribute);
        if usage.is_none() {
            debug!(
                object_name = %snapshot.object_name,
                attribute = %attribute,
                "Memory usage attribute missing or malformed"
            );
        }
        usage
    }
}

/// Garbage collector extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct GcExtractor;

impl GcExtractor {
    /// `GC-<Name>-CollectionCount` and `GC-<Name>-CollectionTime` per collector
    pub fn extract(ctx: &ReportContext, snapshots: &[ManagementObjectSnapshot]) -> Vec<ReportRecord> {
        let mut out = Vec::new();

        for snapshot in snapshots {
            let parsed = snapshot.parsed_name();
            if !Self::is_collector(&snapshot.object_name, parsed.as_ref()) {
                continue;
            }

            let collector = snapshot
                .attribute("Name")
                .map(|v| v.to_string())
                .or_else(|| parsed.as_ref().and_then(|n| n.property("name")).map(str::to_string));
            let Some(collector) = collector else {
                debug!(object_name = %snapshot.object_name, "Garbage collector without a name");
                continue;
            };

            for attribute in ["CollectionCount", "CollectionTime"] {
                let Some(value) = snapshot.attribute(attribute) else {
                    debug!(
                        object_name = %snapshot.object_name,
                        attribute = %attribute,
                        "Garbage collector attribute missing"
                    );
                    continue;
                };
                let metric = format!("GC-{}-{}", collector, attribute).replace(' ', "");
                push(&mut out, ctx, &metric, value.to_string(), &snapshot.object_name);
            }
        }

        out
    }

    fn is_collector(raw: &str, parsed: Option<&ObjectName>) -> bool {
        match parsed {
            Some(name) => {
                name.domain == "java.lang" && name.property("type") == Some("GarbageCollector")
            }
            None => raw.contains("java.lang:type=GarbageCollector"),
        }
    }
}

fn push(out: &mut Vec<ReportRecord>, ctx: &ReportContext, name: &str, value: String, object_name: &str) {
    out.push(ctx.record(name, value, CounterType::Gauge, object_name));
}

fn checked_sub(a: i64, b: i64, metric: &str) -> Result<i64, ExtractError> {
    a.checked_sub(b).ok_or_else(|| ExtractError::Overflow {
        metric: metric.to_string(),
    })
}

/// `used / max` as a percentage, rounded half-up to a whole number and
/// rendered with one decimal (`"50.0"`). `None` when `max <= 0`.
fn used_ratio(used: i64, max: i64, metric: &str) -> Result<Option<String>, ExtractError> {
    if max <= 0 {
        return Ok(None);
    }
    let overflow = || ExtractError::Overflow {
        metric: metric.to_string(),
    };

    // floor(used * 100 / max + 1/2) in exact integer arithmetic
    let numerator = i128::from(used)
        .checked_mul(200)
        .and_then(|n| n.checked_add(i128::from(max)))
        .ok_or_else(overflow)?;
    let denominator = i128::from(max).checked_mul(2).ok_or_else(overflow)?;
    let percent = numerator.div_euclid(denominator);

    Ok(Some(format!("{}.0", percent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::context;
    use crate::snapshot::AttributeValue;
    use std::collections::HashMap;

    fn usage(committed: i64, used: i64, max: i64) -> AttributeValue {
        AttributeValue::Object(HashMap::from([
            ("init".to_string(), AttributeValue::Integer(0)),
            ("committed".to_string(), AttributeValue::Integer(committed)),
            ("used".to_string(), AttributeValue::Integer(used)),
            ("max".to_string(), AttributeValue::Integer(max)),
        ]))
    }

    fn memory(heap: AttributeValue, non_heap: AttributeValue) -> ManagementObjectSnapshot {
        ManagementObjectSnapshot::new("java.lang:type=Memory", HashMap::new())
            .with_attribute("HeapMemoryUsage", heap)
            .with_attribute("NonHeapMemoryUsage", non_heap)
    }

    fn value_of<'a>(records: &'a [ReportRecord], metric: &str) -> Option<&'a str> {
        records
            .iter()
            .find(|r| r.metric == metric)
            .map(|r| r.value.as_str())
    }

    #[test]
    fn test_heap_and_unbounded_non_heap() {
        let records = BuiltinExtractor::extract(
            &context(),
            &[memory(usage(100, 40, 80), usage(50, 30, -1))],
        );

        assert_eq!(value_of(&records, "HeapMemoryCommitted"), Some("100"));
        assert_eq!(value_of(&records, "HeapMemoryFree"), Some("40"));
        assert_eq!(value_of(&records, "HeapMemoryMax"), Some("80"));
        assert_eq!(value_of(&records, "HeapMemoryUsed"), Some("40"));
        assert_eq!(value_of(&records, "HeapMemoryUsedRatio"), Some("50.0"));

        assert_eq!(value_of(&records, "NonHeapMemoryCommitted"), Some("50"));
        assert_eq!(value_of(&records, "NonHeapMemoryUsed"), Some("30"));
        assert_eq!(value_of(&records, "NonHeapMemoryUsedRatio"), Some("-1"));
        assert_eq!(value_of(&records, "NonHeapMemoryMax"), None);
        assert_eq!(value_of(&records, "NonHeapMemoryFree"), None);

        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.counter_type == CounterType::Gauge));
    }

    #[test]
    fn test_bounded_non_heap_emits_max_and_free() {
        let records = BuiltinExtractor::extract(
            &context(),
            &[memory(usage(100, 40, 80), usage(50, 30, 120))],
        );
        assert_eq!(value_of(&records, "NonHeapMemoryUsedRatio"), Some("25.0"));
        assert_eq!(value_of(&records, "NonHeapMemoryMax"), Some("120"));
        assert_eq!(value_of(&records, "NonHeapMemoryFree"), Some("90"));
    }

    #[test]
    fn test_heap_without_max() {
        let records = BuiltinExtractor::extract(
            &context(),
            &[memory(usage(100, 40, -1), usage(50, 30, -1))],
        );
        assert_eq!(value_of(&records, "HeapMemoryUsedRatio"), Some("-1"));
        assert_eq!(value_of(&records, "HeapMemoryMax"), Some("-1"));
        assert_eq!(value_of(&records, "HeapMemoryFree"), Some("-41"));
    }

    #[test]
    fn test_metaspace() {
        let snapshot = ManagementObjectSnapshot::new("java.lang:name=Metaspace,type=MemoryPool", HashMap::new())
            .with_attribute("Usage", usage(64, 48, -1));
        let records = BuiltinExtractor::extract(&context(), &[snapshot]);

        assert_eq!(value_of(&records, "MetaspaceMemoryCommitted"), Some("64"));
        assert_eq!(value_of(&records, "MetaspaceMemoryUsed"), Some("48"));
        assert_eq!(value_of(&records, "MetaspaceMemoryUsedRatio"), Some("-1"));
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_ratio_rounds_half_up() {
        assert_eq!(used_ratio(1, 3, "r").unwrap().as_deref(), Some("33.0"));
        assert_eq!(used_ratio(2, 3, "r").unwrap().as_deref(), Some("67.0"));
        assert_eq!(used_ratio(1, 200, "r").unwrap().as_deref(), Some("1.0"));
        assert_eq!(used_ratio(1, 201, "r").unwrap().as_deref(), Some("0.0"));
        assert_eq!(used_ratio(5, 0, "r").unwrap(), None);
        assert_eq!(used_ratio(i64::MAX, i64::MAX, "r").unwrap().as_deref(), Some("100.0"));
    }

    #[test]
    fn test_overflow_keeps_partial_results() {
        let records = BuiltinExtractor::extract(
            &context(),
            &[memory(usage(100, i64::MIN, 80), usage(50, 30, -1))],
        );
        // free = 80 - i64::MIN overflows; nothing from the heap block is emitted
        assert_eq!(value_of(&records, "HeapMemoryUsed"), None);
        assert!(records.is_empty());
    }

    #[test]
    fn test_extract_errors_are_counted() {
        let metrics = PipelineMetrics::new();
        BuiltinExtractor::extract_with_metrics(
            &context(),
            &[memory(usage(100, i64::MIN, 80), usage(50, 30, -1))],
            &metrics,
        );
        assert_eq!(metrics.extract_errors_total.get(), 1);
    }

    #[test]
    fn test_gc_records() {
        let snapshot = ManagementObjectSnapshot::new("java.lang:type=GarbageCollector,name=PS Scavenge", HashMap::new())
            .with_attribute("Name", AttributeValue::String("PS Scavenge".to_string()))
            .with_attribute("CollectionCount", AttributeValue::Integer(7))
            .with_attribute("CollectionTime", AttributeValue::Integer(123));

        let records = GcExtractor::extract(&context(), &[snapshot]);
        assert_eq!(records.len(), 2);
        assert_eq!(value_of(&records, "GC-PSScavenge-CollectionCount"), Some("7"));
        assert_eq!(value_of(&records, "GC-PSScavenge-CollectionTime"), Some("123"));
        assert!(records.iter().all(|r| r.counter_type == CounterType::Gauge));
    }

    #[test]
    fn test_gc_name_from_property() {
        let snapshot = ManagementObjectSnapshot::new("java.lang:name=G1 Old Generation,type=GarbageCollector", HashMap::new())
            .with_attribute("CollectionCount", AttributeValue::Integer(2));

        let records = GcExtractor::extract(&context(), &[snapshot]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric, "GC-G1OldGeneration-CollectionCount");
    }

    #[test]
    fn test_gc_ignores_other_objects() {
        let snapshot = ManagementObjectSnapshot::new("java.lang:type=Threading", HashMap::new())
            .with_attribute("CollectionCount", AttributeValue::Integer(2));
        assert!(GcExtractor::extract(&context(), &[snapshot]).is_empty());
    }
}
