//! Cleanup Manager
//!
//! Keeps one cleanup service per cache id and starts or stops them together.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::cleanup::{CleanupOptions, CleanupService, CleanupableCache};

#[derive(Debug, Default)]
pub struct CleanupManager {
    services: Mutex<BTreeMap<String, Arc<CleanupService>>>,
}

impl CleanupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a (stopped) service for `cache_id`, replacing and stopping any
    /// previous one.
    pub fn add(
        &self,
        cache_id: impl Into<String>,
        cache: Arc<dyn CleanupableCache>,
        options: CleanupOptions,
    ) -> Arc<CleanupService> {
        let service = Arc::new(CleanupService::new(cache, options));
        if let Some(previous) = self.services.lock().insert(cache_id.into(), Arc::clone(&service)) {
            previous.stop();
        }
        service
    }

    pub fn get(&self, cache_id: &str) -> Option<Arc<CleanupService>> {
        self.services.lock().get(cache_id).cloned()
    }

    pub fn start_all(&self) {
        for (cache_id, service) in self.services.lock().iter() {
            service.start();
            info!(cache = %cache_id, "Started background cleanup");
        }
    }

    pub fn stop_all(&self) {
        for (cache_id, service) in self.services.lock().iter() {
            service.stop();
            info!(cache = %cache_id, "Stopped background cleanup");
        }
    }

    /// Ids of the services currently running.
    pub fn active_services(&self) -> Vec<String> {
        self.services
            .lock()
            .iter()
            .filter(|(_, service)| service.is_active())
            .map(|(cache_id, _)| cache_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{NamedCache, StoreOptions};
    use std::time::Duration;

    fn cache(name: &str) -> Arc<NamedCache<u32>> {
        Arc::new(NamedCache::new(name, StoreOptions::new(Duration::from_millis(50))))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_all() {
        let manager = CleanupManager::new();
        let users = cache("users");
        let orders = cache("orders");
        manager.add("users", users.clone(), CleanupOptions::new(Duration::from_millis(20)));
        manager.add("orders", orders.clone(), CleanupOptions::new(Duration::from_millis(20)));
        assert!(manager.active_services().is_empty());

        manager.start_all();
        assert_eq!(manager.active_services(), vec!["orders".to_string(), "users".to_string()]);

        users.set("a", 1);
        orders.set("b", 2);
        tokio::time::sleep(Duration::from_millis(100)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(users.size(), 0);
        assert_eq!(orders.size(), 0);

        manager.stop_all();
        assert!(manager.active_services().is_empty());
    }

    #[tokio::test]
    async fn test_replacing_service_stops_previous() {
        let manager = CleanupManager::new();
        let first = manager.add("users", cache("users"), CleanupOptions::default());
        first.start();

        let second = manager.add("users", cache("users"), CleanupOptions::default());
        assert!(!first.is_active());
        assert!(!second.is_active());
        assert_eq!(manager.len(), 1);
        assert!(Arc::ptr_eq(&manager.get("users").unwrap(), &second));
    }
}
