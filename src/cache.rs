//! Expiring key/value cache
//!
//! `ExpiringCache` memoizes values together with their insertion time and is
//! swept explicitly once per cycle. The backing store is a `DashMap`, so every
//! operation is atomic per key and callers never hold a lock. A sweep racing
//! with a concurrent insert may keep or drop that one entry for an extra
//! cycle; nothing else depends on the ordering.
//!
//! Time comes from an injected [`Clock`] so TTL behavior is testable without
//! sleeping.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Monotonic time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for tests and replay
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.offset_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

/// Cached value plus its creation time
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
}

/// Concurrent TTL cache, swept explicitly with [`ExpiringCache::evict_expired`]
pub struct ExpiringCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    /// Create an empty cache reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Look up a value. Expiry is only applied by the sweep, never here.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` stamped with the current time, replacing any previous entry
    pub fn put(&self, key: K, value: V) {
        let created_at = self.clock.now();
        self.entries.insert(key, CacheEntry { value, created_at });
    }

    /// Remove every entry whose age has reached `ttl`.
    ///
    /// Returns the number of removed entries.
    pub fn evict_expired(&self, ttl: Duration) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.created_at) < ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, ttl_secs = ttl.as_secs(), "Evicted expired cache entries");
        }
        removed
    }

    /// Remove every key currently mapped to `value`.
    ///
    /// Returns the number of removed entries.
    pub fn evict_by_value(&self, value: &V) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.value != *value);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
