//! Mini Cache - in-process caching and request coalescing
//!
//! TTL-LRU caches with hit/miss metrics, a registry aggregating their
//! statistics, background expiry sweeps, and single-flight coordinators that
//! collapse identical concurrent calls locally or across processes.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod flight;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cachable, CacheRegistry, ExpiryPolicy, NamedCache, StoreOptions, TtlLruStore};
pub use config::Config;
pub use error::{CacheError, QueueError};
pub use flight::{DistributedSingleFlight, InMemoryJobQueue, JobQueue, SingleFlight};
pub use tasks::{CleanupManager, CleanupOptions, CleanupService};
