//! Cache Registry Module
//!
//! Application-scoped directory of named caches with aggregated statistics.
//! The registry is constructed explicitly and shared as `Arc<CacheRegistry>`;
//! tests build isolated registries.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::cache::{MonitoredCache, NamedCache, StoreOptions};

// == Per-Cache Stats ==
/// Statistics for one registered cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsEntry {
    pub name: String,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub total_requests: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response_time: Option<f64>,
}

// == Registry Stats ==
/// Aggregated statistics across every registered cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total_caches: usize,
    pub total_size: usize,
    pub total_hits: u64,
    pub total_misses: u64,
    /// Pooled hit rate: total hits over total requests
    pub overall_hit_rate: f64,
    pub caches: Vec<CacheStatsEntry>,
}

impl RegistryStats {
    fn empty() -> Self {
        Self {
            total_caches: 0,
            total_size: 0,
            total_hits: 0,
            total_misses: 0,
            overall_hit_rate: 0.0,
            caches: Vec::new(),
        }
    }
}

// == Cache Registry ==
#[derive(Default)]
pub struct CacheRegistry {
    caches: RwLock<BTreeMap<String, Arc<dyn MonitoredCache>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Registers a cache under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, cache: Arc<dyn MonitoredCache>) {
        let name = name.into();
        debug!(cache = %name, "Registering cache");
        self.caches.write().insert(name, cache);
    }

    // == Create Cache ==
    /// Builds a named cache, registers it under its name and returns it.
    pub fn create_cache<V>(&self, name: impl Into<String>, options: StoreOptions) -> Arc<NamedCache<V>>
    where
        V: Clone + Send + 'static,
    {
        let cache = Arc::new(NamedCache::new(name, options));
        self.register(cache.name().to_string(), cache.clone());
        cache
    }

    /// Like `create_cache`, with a custom response-time sample window.
    pub fn create_cache_with_window<V>(
        &self,
        name: impl Into<String>,
        options: StoreOptions,
        window: usize,
    ) -> Arc<NamedCache<V>>
    where
        V: Clone + Send + 'static,
    {
        let cache = Arc::new(NamedCache::with_response_time_window(name, options, window));
        self.register(cache.name().to_string(), cache.clone());
        cache
    }

    /// Removes a cache. Returns true if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.caches.write().remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn MonitoredCache>> {
        self.caches.read().get(name).cloned()
    }

    /// Registered names in sorted order.
    pub fn cache_names(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }

    // == Stats ==
    /// Sums sizes and counters across caches and computes the pooled hit rate.
    pub fn stats(&self) -> RegistryStats {
        let caches = self.caches.read();
        if caches.is_empty() {
            return RegistryStats::empty();
        }

        let entries: Vec<CacheStatsEntry> = caches
            .iter()
            .map(|(name, cache)| {
                let metrics = cache.metrics();
                CacheStatsEntry {
                    name: name.clone(),
                    size: metrics.current_size,
                    hits: metrics.hits,
                    misses: metrics.misses,
                    hit_rate: metrics.hit_rate,
                    total_requests: metrics.total_requests,
                    average_response_time: metrics.average_response_time,
                }
            })
            .collect();

        let total_size = entries.iter().map(|e| e.size).sum();
        let total_hits: u64 = entries.iter().map(|e| e.hits).sum();
        let total_misses: u64 = entries.iter().map(|e| e.misses).sum();
        let total_requests = total_hits + total_misses;
        let overall_hit_rate = if total_requests > 0 {
            total_hits as f64 / total_requests as f64
        } else {
            0.0
        };

        RegistryStats {
            total_caches: entries.len(),
            total_size,
            total_hits,
            total_misses,
            overall_hit_rate,
            caches: entries,
        }
    }

    // == Reset ==
    /// Resets counters of every cache. Cached data is kept.
    pub fn reset_all_metrics(&self) {
        for cache in self.caches.read().values() {
            cache.reset_metrics();
        }
    }

    /// Resets counters of one cache. Returns false if the name is unknown.
    pub fn reset_cache_metrics(&self, name: &str) -> bool {
        match self.caches.read().get(name) {
            Some(cache) => {
                cache.reset_metrics();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.cache_names())
            .finish()
    }
}
