//! Cache Store Module
//!
//! TTL-aware LRU store combining a HashMap index with an ordered node list.
//!
//! Every operation except [`TtlLruStore::cleanup_expired_entries`] is O(1)
//! amortized. Entries expire lazily on access and in bulk on sweeps; there is
//! no capacity bound.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::{NodeId, OrderedList, DEFAULT_TTL};

// == Expiry Policy ==
/// Controls whether reads extend an entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Every successful `get`/`has` pushes expiry to `now + ttl`
    #[default]
    RefreshOnRead,
    /// Expiry is set by writes only
    FixedFromWrite,
}

// == Store Options ==
/// Per-store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Lifetime of an entry after its last refresh
    pub ttl: Duration,
    /// Read-refresh behaviour
    pub expiry_policy: ExpiryPolicy,
}

impl StoreOptions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            expiry_policy: ExpiryPolicy::default(),
        }
    }

    pub fn with_expiry_policy(mut self, expiry_policy: ExpiryPolicy) -> Self {
        self.expiry_policy = expiry_policy;
        self
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Index entry: where the node lives and when it stops being visible.
#[derive(Debug, Clone, Copy)]
struct Slot {
    node: NodeId,
    expires_at: Instant,
}

// == TTL LRU Store ==
/// In-memory key-value store with time-based expiry and recency ordering.
///
/// A key is in the index if and only if its node is in the list. The list
/// tail is always the most recently read or written entry.
#[derive(Debug)]
pub struct TtlLruStore<V> {
    /// Key to node/expiry index
    entries: HashMap<String, Slot>,
    /// Recency order, least recent first
    order: OrderedList<V>,
    options: StoreOptions,
}

impl<V: Clone> TtlLruStore<V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new(options: StoreOptions) -> Self {
        Self {
            entries: HashMap::new(),
            order: OrderedList::new(),
            options,
        }
    }

    /// Creates an empty store with the default expiry policy.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(StoreOptions::new(ttl))
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    // == Set ==
    /// Inserts or refreshes an entry with expiry `now + ttl`.
    ///
    /// A live entry keeps its node, which gets the new value and moves to the
    /// most recently used position. An expired entry is dropped and replaced.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.set_at(key.into(), value, Instant::now());
    }

    pub(crate) fn set_at(&mut self, key: String, value: V, now: Instant) {
        if let Some(node) = self.live_node(&key, now) {
            if let Some(existing) = self.order.get_mut(node) {
                existing.set_value(value);
            }
            self.touch(&key, node, now, true);
            return;
        }

        let node = self.order.push_back(key.clone(), value);
        self.entries.insert(
            key,
            Slot {
                node,
                expires_at: now + self.options.ttl,
            },
        );
    }

    // == Get ==
    /// Returns the value of a live entry.
    ///
    /// An expired entry is removed and reported as absent, exactly like a key
    /// that was never set.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&mut self, key: &str, now: Instant) -> Option<V> {
        let node = self.access(key, now)?;
        self.order.get(node).map(|n| n.value().clone())
    }

    // == Has ==
    /// Same liveness check and refresh as `get`, without cloning the value.
    pub fn has(&mut self, key: &str) -> bool {
        self.has_at(key, Instant::now())
    }

    pub(crate) fn has_at(&mut self, key: &str, now: Instant) -> bool {
        self.access(key, now).is_some()
    }

    // == Size ==
    /// Number of indexed entries, including expired ones not yet swept.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Delete ==
    /// Removes an entry. Returns true if the key was indexed.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(slot) => {
                self.order.remove(slot.node);
                true
            }
            None => false,
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    // == Time To Live ==
    /// Remaining lifetime of an entry without touching it.
    ///
    /// Returns `Some(Duration::ZERO)` for expired entries that have not been
    /// swept yet and `None` for unknown keys.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .map(|slot| slot.expires_at.saturating_duration_since(Instant::now()))
    }

    // == Cleanup Expired ==
    /// Evicts every entry whose expiry has passed.
    ///
    /// Full scan; returns the number of entries removed.
    pub fn cleanup_expired_entries(&mut self) -> usize {
        self.cleanup_expired_entries_at(Instant::now())
    }

    pub(crate) fn cleanup_expired_entries_at(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| now >= slot.expires_at)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(slot) = self.entries.remove(key) {
                self.order.remove(slot.node);
            }
        }

        expired.len()
    }

    // == Pop LRU ==
    /// Removes and returns the least recently used entry, live or not.
    pub fn pop_lru(&mut self) -> Option<(String, V)> {
        let (key, value) = self.order.pop_front()?;
        self.entries.remove(&key);
        Some((key, value))
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|(key, _)| key)
    }

    /// Resolves a live node, lazily dropping it if expired.
    fn live_node(&mut self, key: &str, now: Instant) -> Option<NodeId> {
        let slot = *self.entries.get(key)?;
        if now >= slot.expires_at {
            self.entries.remove(key);
            self.order.remove(slot.node);
            return None;
        }
        Some(slot.node)
    }

    fn access(&mut self, key: &str, now: Instant) -> Option<NodeId> {
        let node = self.live_node(key, now)?;
        let refresh = self.options.expiry_policy == ExpiryPolicy::RefreshOnRead;
        self.touch(key, node, now, refresh);
        Some(node)
    }

    fn touch(&mut self, key: &str, node: NodeId, now: Instant, refresh_expiry: bool) {
        if refresh_expiry {
            if let Some(slot) = self.entries.get_mut(key) {
                slot.expires_at = now + self.options.ttl;
            }
        }
        self.order.move_to_back(node);
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        self.order.assert_consistent();
        assert_eq!(self.entries.len(), self.order.len());
        for (key, slot) in &self.entries {
            let node = self.order.get(slot.node).expect("indexed node missing from list");
            assert_eq!(node.key(), key);
        }
    }
}
