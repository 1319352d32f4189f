//! Cachable Module
//!
//! Explicit read-through caching around an async loader.
//!
//! ```rust,ignore
//! let cache = registry.create_cache::<User>("UserService#get_user", StoreOptions::default());
//! let users = Cachable::new(cache);
//! let user = users.get_or_load(&id, || repository.fetch(id)).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::cache::{MonitoredCache, NamedCache};

/// Key segment used when the arguments serialize to `null`, e.g. `()`.
const NO_ARGS: &str = "no-args";

// == Cachable ==
/// Read-through cache layer: serves hits from a named cache and stores the
/// loader's successful results.
#[derive(Debug, Clone)]
pub struct Cachable<V> {
    cache: Arc<NamedCache<V>>,
    key_prefix: String,
}

impl<V: Clone + Send + 'static> Cachable<V> {
    /// Wraps a cache, using its name as the key prefix.
    pub fn new(cache: Arc<NamedCache<V>>) -> Self {
        let key_prefix = cache.name().to_string();
        Self { cache, key_prefix }
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn cache(&self) -> &Arc<NamedCache<V>> {
        &self.cache
    }

    /// Builds `prefix:json(args)`. None if the arguments cannot be serialized.
    pub fn cache_key<A: Serialize + ?Sized>(&self, args: &A) -> Option<String> {
        let args_key = serde_json::to_string(args).ok()?;
        let args_key = if args_key == "null" { NO_ARGS.to_string() } else { args_key };
        Some(format!("{}:{}", self.key_prefix, args_key))
    }

    // == Get Or Load ==
    /// Returns the cached value for `args`, or awaits `load` and caches its
    /// result. Loader errors are returned as-is and never cached.
    pub async fn get_or_load<A, F, Fut, E>(&self, args: &A, load: F) -> Result<V, E>
    where
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let Some(key) = self.cache_key(args) else {
            warn!(cache = %self.key_prefix, "Arguments not serializable, bypassing cache");
            return load().await;
        };

        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        let value = load().await?;
        self.cache.set(key, value.clone());
        Ok(value)
    }
}
