// In-memory driver
// Author: kelexine (https://github.com/kelexine)

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::CacheDriver;
use crate::cache::entry::{self, resolve_ttl, CacheEntry};
use crate::cache::CacheValue;
use crate::metrics;

const DRIVER: &str = "memory";

/// Map shared by one or more `MemoryCache` instances, keyed by prefixed key.
pub type MemoryStore = Arc<Mutex<HashMap<String, CacheEntry>>>;

/// Process-local cache. Entries live as long as the store does.
pub struct MemoryCache {
    store: MemoryStore,
    prefix: String,
    default_ttl: Option<u64>,
}

impl MemoryCache {
    /// Create a driver over its own private store.
    pub fn new(prefix: impl Into<String>, default_ttl: Option<u64>) -> Self {
        Self::with_store(MemoryStore::default(), prefix, default_ttl)
    }

    /// Create a driver over an existing store, e.g. to share one map between
    /// differently prefixed instances.
    pub fn with_store(store: MemoryStore, prefix: impl Into<String>, default_ttl: Option<u64>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    pub fn store(&self) -> MemoryStore {
        Arc::clone(&self.store)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of entries in the underlying store, expired ones included.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Live entry for `key`; drops it if expired.
    fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let prefixed = self.prefixed(key);
        let mut store = self.store.lock();
        let entry = store.get(&prefixed)?;

        if entry.is_live(entry::now()) {
            return Some(entry.clone());
        }

        debug!("Expired entry removed: {}", prefixed);
        store.remove(&prefixed);
        metrics::record_expired(DRIVER, 1);
        None
    }
}

impl CacheDriver for MemoryCache {
    fn name(&self) -> &'static str {
        DRIVER
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        match self.live_entry(key) {
            Some(entry) => {
                metrics::record_hit(DRIVER);
                Some(entry.value)
            }
            None => {
                metrics::record_miss(DRIVER);
                None
            }
        }
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<u64>) -> bool {
        let entry = CacheEntry::with_ttl(value, resolve_ttl(ttl, self.default_ttl));
        self.store.lock().insert(self.prefixed(key), entry);
        metrics::record_write(DRIVER, true);
        true
    }

    fn delete(&self, key: &str) -> bool {
        self.store.lock().remove(&self.prefixed(key));
        metrics::record_delete(DRIVER);
        true
    }

    fn clear(&self) -> bool {
        let mut store = self.store.lock();
        if self.prefix.is_empty() {
            store.clear();
        } else {
            store.retain(|key, _| !key.starts_with(&self.prefix));
        }
        debug!("Memory cache cleared (prefix: {:?})", self.prefix);
        true
    }

    fn increment(&self, key: &str, by: i64) -> i64 {
        let next = match self.live_entry(key) {
            Some(current) => current.adjusted(by),
            None => CacheEntry::with_ttl(CacheValue::Int(by), self.default_ttl),
        };
        let result = next.value.as_counter();
        self.store.lock().insert(self.prefixed(key), next);
        result
    }

    fn clean_expired(&self) -> usize {
        let now = entry::now();
        let mut store = self.store.lock();
        let before = store.len();
        store.retain(|key, entry| !key.starts_with(&self.prefix) || entry.is_live(now));
        let removed = before - store.len();

        if removed > 0 {
            debug!("Cleaned up {} expired memory entries", removed);
        }
        metrics::record_expired(DRIVER, removed);
        removed
    }
}
