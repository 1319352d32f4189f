//! Cache Metrics Module
//!
//! Tracks hit/miss counters and recent response times, independent of storage.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Default number of response-time samples kept per collector.
pub const DEFAULT_RESPONSE_TIME_WINDOW: usize = 100;

// == Cache Metrics ==
/// Point-in-time snapshot of a cache's metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub total_requests: u64,
    /// Entries currently indexed by the cache
    pub current_size: usize,
    /// Mean of the sampled response times in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response_time: Option<f64>,
}

// == Metrics Collector ==
/// Hit/miss counters plus a bounded sliding window of response times.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    hits: u64,
    misses: u64,
    /// Recent samples in milliseconds, oldest first
    samples: VecDeque<f64>,
    window: usize,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    // == Constructor ==
    /// Creates a collector with the default sample window.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_RESPONSE_TIME_WINDOW)
    }

    /// Creates a collector keeping at most `window` samples (minimum 1).
    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            hits: 0,
            misses: 0,
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Response Time ==
    /// Adds a sample, dropping the oldest one once the window is full.
    pub fn record_response_time(&mut self, elapsed: Duration) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Mean response time in milliseconds, None until a sample exists.
    pub fn average_response_time(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    // == Reset ==
    /// Zeroes counters and clears the sample history.
    pub fn reset(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.samples.clear();
    }

    /// Builds a snapshot, pairing the counters with the cache's current size.
    pub fn snapshot(&self, current_size: usize) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits,
            misses: self.misses,
            hit_rate: self.hit_rate(),
            total_requests: self.total_requests(),
            current_size,
            average_response_time: self.average_response_time(),
        }
    }
}
