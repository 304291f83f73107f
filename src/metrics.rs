//! Internal pipeline metrics for jmx-reporter
//!
//! Counters describing the reporter's own operation. They are logged as a
//! [`PipelineStats`] snapshot after every cycle by the binary.
//!
//! # Metrics
//!
//! - `cycles_total` - Counter of completed report cycles
//! - `records_emitted_total` - Counter of records handed to the transport
//! - `connections_evicted_total` - Counter of connections evicted by liveness gating
//! - `dropped_counter_type_total` - Records dropped for an invalid counter type
//! - `dropped_non_numeric_total` - Records dropped for a non-numeric value
//! - `extract_errors_total` - Builtin extraction failures (arithmetic overflow)
//! - `directory_cache_entries` - Gauge of cached directory entries
//! - `cycle_duration_seconds` - Histogram of cycle durations

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Default histogram buckets for cycle duration (in seconds)
pub const DEFAULT_HISTOGRAM_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Thread-safe counter using atomic operations
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter initialized to 0
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Increment the counter by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by a specific amount
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Get the current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Thread-safe gauge using atomic operations
#[derive(Debug, Default)]
pub struct Gauge {
    /// Stored as bits of f64 for atomic operations
    value: AtomicU64,
}

impl Gauge {
    /// Create a new gauge initialized to 0
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0.0_f64.to_bits()),
        }
    }

    /// Set the gauge to a specific value
    pub fn set(&self, v: f64) {
        self.value.store(v.to_bits(), Ordering::Relaxed);
    }

    /// Get the current value
    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }
}

/// Thread-safe histogram for measuring distributions
#[derive(Debug)]
pub struct Histogram {
    /// Bucket boundaries (upper bounds)
    buckets: Vec<f64>,
    /// Bucket counters (count of observations <= bucket boundary)
    bucket_counts: Vec<AtomicU64>,
    /// Sum of all observed values
    sum: AtomicU64,
    /// Total count of observations
    count: AtomicU64,
}

impl Histogram {
    /// Create a new histogram with the given bucket boundaries
    pub fn new(buckets: &[f64]) -> Self {
        let mut sorted_buckets: Vec<f64> = buckets.to_vec();
        sorted_buckets.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        // Add +Inf bucket if not present
        if sorted_buckets
            .last()
            .map(|v| !v.is_infinite())
            .unwrap_or(true)
        {
            sorted_buckets.push(f64::INFINITY);
        }

        let bucket_counts = (0..sorted_buckets.len())
            .map(|_| AtomicU64::new(0))
            .collect();

        Self {
            buckets: sorted_buckets,
            bucket_counts,
            sum: AtomicU64::new(0.0_f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    /// Create a histogram with default buckets for cycle durations
    pub fn with_default_buckets() -> Self {
        Self::new(DEFAULT_HISTOGRAM_BUCKETS)
    }

    /// Observe a value
    pub fn observe(&self, v: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);

        // atomic f64 add
        loop {
            let current = self.sum.load(Ordering::Relaxed);
            let new = f64::from_bits(current) + v;
            if self
                .sum
                .compare_exchange_weak(current, new.to_bits(), Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }

        for (i, &bound) in self.buckets.iter().enumerate() {
            if v <= bound {
                self.bucket_counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get the sum of all observations
    pub fn get_sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Relaxed))
    }

    /// Get the total count of observations
    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get bucket boundaries and their cumulative counts
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        self.buckets
            .iter()
            .zip(self.bucket_counts.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_default_buckets()
    }
}

/// Pipeline metrics registry
///
/// Shared between the pipeline stages through an `Arc`.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub cycles_total: Counter,
    pub records_emitted_total: Counter,
    pub connections_evicted_total: Counter,
    pub dropped_counter_type_total: Counter,
    pub dropped_non_numeric_total: Counter,
    pub extract_errors_total: Counter,
    pub directory_cache_entries: Gauge,
    pub cycle_duration_seconds: Histogram,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished cycle
    pub fn record_cycle(&self, duration: Duration, emitted: usize) {
        self.cycles_total.inc();
        self.records_emitted_total.inc_by(emitted as u64);
        self.cycle_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Point-in-time copy for logging or serialization
    pub fn snapshot(&self) -> PipelineStats {
        let cycles = self.cycle_duration_seconds.get_count();
        PipelineStats {
            cycles_total: self.cycles_total.get(),
            records_emitted_total: self.records_emitted_total.get(),
            connections_evicted_total: self.connections_evicted_total.get(),
            dropped_counter_type_total: self.dropped_counter_type_total.get(),
            dropped_non_numeric_total: self.dropped_non_numeric_total.get(),
            extract_errors_total: self.extract_errors_total.get(),
            directory_cache_entries: self.directory_cache_entries.get() as u64,
            avg_cycle_seconds: if cycles == 0 {
                0.0
            } else {
                self.cycle_duration_seconds.get_sum() / cycles as f64
            },
        }
    }
}

/// Serializable snapshot of [`PipelineMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub cycles_total: u64,
    pub records_emitted_total: u64,
    pub connections_evicted_total: u64,
    pub dropped_counter_type_total: u64,
    pub dropped_non_numeric_total: u64,
    pub extract_errors_total: u64,
    pub directory_cache_entries: u64,
    pub avg_cycle_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_basic() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);

        counter.inc();
        assert_eq!(counter.get(), 1);

        counter.inc_by(5);
        assert_eq!(counter.get(), 6);
    }

    #[test]
    fn test_counter_concurrent() {
        let counter = Arc::new(Counter::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let c = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    c.inc();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.get(), 1000);
    }

    #[test]
    fn test_gauge_set() {
        let gauge = Gauge::new();
        assert_eq!(gauge.get(), 0.0);
        gauge.set(42.0);
        assert_eq!(gauge.get(), 42.0);
    }

    #[test]
    fn test_histogram_basic() {
        let histogram = Histogram::new(&[0.1, 0.5, 1.0]);

        histogram.observe(0.05);
        histogram.observe(0.3);
        histogram.observe(0.8);
        histogram.observe(2.0);

        assert_eq!(histogram.get_count(), 4);
        assert!((histogram.get_sum() - 3.15).abs() < 0.001);

        let buckets = histogram.get_buckets();
        assert_eq!(buckets.len(), 4); // 3 + Inf
        assert_eq!(buckets[0], (0.1, 1));
        assert_eq!(buckets[1], (0.5, 2));
        assert_eq!(buckets[2], (1.0, 3));
        assert_eq!(buckets[3].1, 4);
    }

    #[test]
    fn test_pipeline_snapshot() {
        let metrics = PipelineMetrics::new();
        metrics.record_cycle(Duration::from_millis(10), 12);
        metrics.record_cycle(Duration::from_millis(30), 8);
        metrics.connections_evicted_total.inc();
        metrics.dropped_counter_type_total.inc();

        let stats = metrics.snapshot();
        assert_eq!(stats.cycles_total, 2);
        assert_eq!(stats.records_emitted_total, 20);
        assert_eq!(stats.connections_evicted_total, 1);
        assert_eq!(stats.dropped_counter_type_total, 1);
        assert!((stats.avg_cycle_seconds - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = PipelineMetrics::new().snapshot();
        assert_eq!(stats.cycles_total, 0);
        assert_eq!(stats.avg_cycle_seconds, 0.0);
    }
}
