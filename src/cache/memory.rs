//! Memory Cache Module
//!
//! Fastest cache tier: a bounded HashMap with per-entry TTL and lazy eviction.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, CacheStats, SharedClock, SystemClock};

/// Memory cache handle shared between the resolver, the API and the cleanup task.
pub type SharedMemoryCache = Arc<RwLock<MemoryCache<Value>>>;

// == Memory Cache ==
/// Process-local key/value store with per-entry TTL.
///
/// Reads never scan: an expired entry is only removed when it is read or
/// when [`MemoryCache::cleanup`] runs.
#[derive(Debug)]
pub struct MemoryCache<V = Value> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    clock: SharedClock,
}

impl<V: Clone> MemoryCache<V> {
    // == Constructor ==
    /// Creates a cache holding at most `max_entries` entries, read against the wall clock.
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    /// Creates a cache that reads time from `clock`.
    pub fn with_clock(max_entries: usize, clock: SharedClock) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    /// Wraps the cache for sharing across tasks.
    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    // == Set ==
    /// Stores `value` under `key`, expiring `ttl_seconds` from now.
    ///
    /// Overwrites any existing entry. When a new key would exceed capacity,
    /// expired entries are dropped first, then the entry closest to expiry.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl_seconds: u64) {
        let key = key.into();
        let now = self.clock.now_ms();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.cleanup();
            if self.entries.len() >= self.max_entries {
                self.evict_soonest_expiring();
            }
        }

        let entry = CacheEntry::new(key.clone(), value, ttl_seconds, now);
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns the value for `key` if present and unexpired.
    ///
    /// An expired entry counts as a miss and is removed.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.stats.record_hit();
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
        }
        self.stats.record_miss();
        None
    }

    // == Delete ==
    /// Removes `key`, returning whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        self.stats.set_total_entries(self.entries.len());
        existed
    }

    // == Clear ==
    /// Empties the cache. Statistics counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    // == Cleanup ==
    /// Removes every expired entry, returning how many were removed.
    pub fn cleanup(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();

        self.entries.retain(|_, entry| !entry.is_expired_at(now));

        let removed = before - self.entries.len();
        self.stats.record_expirations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Number of stored entries, expired ones included until they are removed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_soonest_expiring(&mut self) {
        let victim = self
            .entries
            .values()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key.clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            self.stats.record_eviction();
        }
    }
}
