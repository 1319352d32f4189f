//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, LRU ordering and metrics.

mod cachable;
mod list;
mod metrics;
mod named;
mod registry;
mod store;


use std::time::Duration;

// Re-export public types
pub use cachable::Cachable;
pub use list::{Iter, ListNode, NodeId, OrderedList};
pub use metrics::{CacheMetrics, MetricsCollector, DEFAULT_RESPONSE_TIME_WINDOW};
pub use named::{MonitoredCache, NamedCache};
pub use registry::{CacheRegistry, CacheStatsEntry, RegistryStats};
pub use store::{ExpiryPolicy, StoreOptions, TtlLruStore};

// == Public Constants ==
/// Entry lifetime used when none is configured
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
