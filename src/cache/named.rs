//! Named Cache Module
//!
//! Composes a TTL-LRU store with a metrics collector under a stable name.

use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::{CacheMetrics, MetricsCollector, StoreOptions, TtlLruStore};
use crate::error::Result;
use crate::tasks::CleanupableCache;

// == Monitored Cache ==
/// What the registry needs from a cache, independent of its value type.
pub trait MonitoredCache: Send + Sync {
    fn name(&self) -> &str;

    fn metrics(&self) -> CacheMetrics;

    /// Clears counters and samples. Stored data is untouched.
    fn reset_metrics(&self);
}

// == Named Cache ==
/// Thread-safe, instrumented cache.
///
/// Every `get` and `has` records one hit or miss, then one response-time
/// sample. `set`, `size` and cleanup do not touch the metrics.
#[derive(Debug)]
pub struct NamedCache<V> {
    name: String,
    store: Mutex<TtlLruStore<V>>,
    metrics: Mutex<MetricsCollector>,
}

impl<V: Clone> NamedCache<V> {
    // == Constructor ==
    pub fn new(name: impl Into<String>, options: StoreOptions) -> Self {
        Self::with_metrics(name, options, MetricsCollector::new())
    }

    /// Creates a cache keeping at most `window` response-time samples.
    pub fn with_response_time_window(
        name: impl Into<String>,
        options: StoreOptions,
        window: usize,
    ) -> Self {
        Self::with_metrics(name, options, MetricsCollector::with_window(window))
    }

    fn with_metrics(name: impl Into<String>, options: StoreOptions, metrics: MetricsCollector) -> Self {
        Self {
            name: name.into(),
            store: Mutex::new(TtlLruStore::new(options)),
            metrics: Mutex::new(metrics),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let started = Instant::now();
        let value = self.store.lock().get(key);
        self.record(value.is_some(), started);
        value
    }

    pub fn has(&self, key: &str) -> bool {
        let started = Instant::now();
        let found = self.store.lock().has(key);
        self.record(found, started);
        found
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.store.lock().set(key, value);
    }

    pub fn delete(&self, key: &str) -> bool {
        self.store.lock().delete(key)
    }

    pub fn clear(&self) {
        self.store.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.store.lock().size()
    }

    /// Sweeps expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.store.lock().cleanup_expired_entries()
    }

    fn record(&self, hit: bool, started: Instant) {
        let mut metrics = self.metrics.lock();
        if hit {
            metrics.record_hit();
        } else {
            metrics.record_miss();
        }
        metrics.record_response_time(started.elapsed());
    }
}

impl<V: Clone + Send> MonitoredCache for NamedCache<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> CacheMetrics {
        let current_size = self.size();
        self.metrics.lock().snapshot(current_size)
    }

    fn reset_metrics(&self) {
        self.metrics.lock().reset();
    }
}

impl<V: Clone + Send> CleanupableCache for NamedCache<V> {
    fn cleanup_expired_entries(&self) -> Result<()> {
        self.purge_expired();
        Ok(())
    }

    fn size(&self) -> usize {
        NamedCache::size(self)
    }
}
