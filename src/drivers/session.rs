// Session-backed driver
// Author: kelexine (https://github.com/kelexine)
//
// Entries live in one map attribute of the bound session, so they survive
// across requests that resume the same session and vanish with it.

use std::collections::BTreeMap;
use tracing::debug;

use super::CacheDriver;
use crate::cache::entry::{self, resolve_ttl, CacheEntry};
use crate::cache::CacheValue;
use crate::metrics;
use crate::session::{self, Session};

const DRIVER: &str = "session";

/// Session attribute holding the cache bucket.
pub const STORAGE_KEY: &str = "_stashkit_cache";

type Bucket = BTreeMap<String, CacheValue>;

pub struct SessionCache {
    /// Pinned session, or `None` to follow whatever session is bound to the
    /// calling thread.
    session: Option<Session>,
    prefix: String,
    default_ttl: Option<u64>,
}

impl SessionCache {
    /// Follow the calling thread's session on every operation. Starts a
    /// session on the constructing thread if none is bound yet.
    pub fn new(prefix: impl Into<String>, default_ttl: Option<u64>) -> Self {
        let session = match session::current() {
            Some(session) => session,
            None => {
                debug!("No active session; starting one for the session cache");
                session::start()
            }
        };
        init_bucket(&session);

        Self {
            session: None,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    /// Pin the driver to an explicit session handle.
    pub fn with_session(session: Session, prefix: impl Into<String>, default_ttl: Option<u64>) -> Self {
        init_bucket(&session);

        Self {
            session: Some(session),
            prefix: prefix.into(),
            default_ttl,
        }
    }

    /// Session the next operation will use.
    pub fn session(&self) -> Session {
        match &self.session {
            Some(session) => session.clone(),
            None => session::ensure_started(),
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Run `f` over the bucket, resetting it if something else was stored
    /// under the storage key.
    fn with_bucket<R>(&self, f: impl FnOnce(&mut Bucket) -> R) -> R {
        self.session().update(STORAGE_KEY, |slot| {
            let mut bucket = match slot.take() {
                Some(CacheValue::Map(bucket)) => bucket,
                _ => Bucket::new(),
            };
            let result = f(&mut bucket);
            *slot = Some(CacheValue::Map(bucket));
            result
        })
    }

    fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let prefixed = self.prefixed(key);
        self.with_bucket(|bucket| {
            let stored = bucket.get(&prefixed)?;

            let Some(entry) = decode_entry(stored) else {
                debug!("Malformed session cache entry removed: {}", prefixed);
                bucket.remove(&prefixed);
                return None;
            };

            if !entry.is_live(entry::now()) {
                bucket.remove(&prefixed);
                metrics::record_expired(DRIVER, 1);
                return None;
            }

            Some(entry)
        })
    }

    fn store(&self, key: &str, entry: CacheEntry) {
        let prefixed = self.prefixed(key);
        self.with_bucket(|bucket| {
            bucket.insert(prefixed, encode_entry(entry));
        });
        metrics::record_write(DRIVER, true);
    }
}

fn init_bucket(session: &Session) {
    session.update(STORAGE_KEY, |slot| {
        if !matches!(slot, Some(CacheValue::Map(_))) {
            *slot = Some(CacheValue::Map(Bucket::new()));
        }
    });
}

fn encode_entry(entry: CacheEntry) -> CacheValue {
    let mut map = BTreeMap::new();
    map.insert("expires".to_string(), entry.expires_at.into());
    map.insert("value".to_string(), entry.value);
    CacheValue::Map(map)
}

fn decode_entry(stored: &CacheValue) -> Option<CacheEntry> {
    let map = stored.as_map()?;
    let expires_at = match map.get("expires")? {
        CacheValue::Null => None,
        CacheValue::Int(at) => Some(*at),
        _ => return None,
    };
    let value = map.get("value")?.clone();
    Some(CacheEntry::new(value, expires_at))
}

impl CacheDriver for SessionCache {
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
        self.store(key, CacheEntry::with_ttl(value, resolve_ttl(ttl, self.default_ttl)));
        true
    }

    fn delete(&self, key: &str) -> bool {
        let prefixed = self.prefixed(key);
        self.with_bucket(|bucket| bucket.remove(&prefixed));
        metrics::record_delete(DRIVER);
        true
    }

    fn clear(&self) -> bool {
        self.with_bucket(|bucket| {
            if self.prefix.is_empty() {
                bucket.clear();
            } else {
                bucket.retain(|key, _| !key.starts_with(&self.prefix));
            }
        });
        true
    }

    fn increment(&self, key: &str, by: i64) -> i64 {
        let next = match self.live_entry(key) {
            Some(current) => current.adjusted(by),
            None => CacheEntry::with_ttl(CacheValue::Int(by), self.default_ttl),
        };
        let result = next.value.as_counter();
        self.store(key, next);
        result
    }

    fn clean_expired(&self) -> usize {
        let now = entry::now();
        let removed = self.with_bucket(|bucket| {
            let before = bucket.len();
            bucket.retain(|key, stored| {
                !key.starts_with(&self.prefix) || decode_entry(stored).map_or(true, |e| e.is_live(now))
            });
            before - bucket.len()
        });
        metrics::record_expired(DRIVER, removed);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_starts_session() {
        session::end();
        let cache = SessionCache::new("", None);

        let bound = session::current().expect("session should be started");
        assert!(bound.same_as(&cache.session()));
        assert!(matches!(bound.get(STORAGE_KEY), Some(CacheValue::Map(_))));
        session::end();
    }

    #[test]
    fn test_unpinned_driver_follows_bound_session() {
        session::end();
        let cache = SessionCache::new("", None);
        let first = session::current().unwrap();
        cache.set("cart", CacheValue::from("first"), None);

        let second = Session::new();
        session::resume(second.clone());
        assert_eq!(cache.get("cart"), None);
        cache.set("cart", CacheValue::from("second"), None);

        session::resume(first);
        assert_eq!(cache.get("cart"), Some(CacheValue::from("first")));
        assert!(matches!(second.get(STORAGE_KEY), Some(CacheValue::Map(ref bucket)) if bucket.len() == 1));
        session::end();
    }

    #[test]
    fn test_entries_survive_across_driver_instances() {
        let session = Session::new();
        let first = SessionCache::with_session(session.clone(), "app:", None);
        first.set("user:1", CacheValue::from("Alice"), Some(600));

        let second = SessionCache::with_session(session, "app:", None);
        assert_eq!(second.get("user:1"), Some(CacheValue::from("Alice")));
    }

    #[test]
    fn test_malformed_entry_is_removed() {
        let session = Session::new();
        let cache = SessionCache::with_session(session.clone(), "", None);
        cache.with_bucket(|bucket| {
            bucket.insert("bad".to_string(), CacheValue::from("not an entry"));
        });

        assert_eq!(cache.get("bad"), None);
        cache.with_bucket(|bucket| assert!(!bucket.contains_key("bad")));
    }

    #[test]
    fn test_expired_entry_and_sweep() {
        let cache = SessionCache::with_session(Session::new(), "", None);
        cache.store("old", CacheEntry::new(CacheValue::Int(1), Some(entry::now() - 5)));
        cache.store("older", CacheEntry::new(CacheValue::Int(2), Some(entry::now() - 50)));
        cache.set("fresh", CacheValue::Int(3), None);

        assert_eq!(cache.get("old"), None);
        assert_eq!(cache.clean_expired(), 1);
        assert_eq!(cache.get("fresh"), Some(CacheValue::Int(3)));
    }

    #[test]
    fn test_clean_expired_stays_inside_prefix() {
        let session = Session::new();
        let a = SessionCache::with_session(session.clone(), "a:", None);
        let b = SessionCache::with_session(session, "b:", None);
        a.store("old", CacheEntry::new(CacheValue::Int(1), Some(entry::now() - 5)));
        b.store("old", CacheEntry::new(CacheValue::Int(2), Some(entry::now() - 5)));

        assert_eq!(a.clean_expired(), 1);
        b.with_bucket(|bucket| assert!(bucket.contains_key("b:old")));
    }

    #[test]
    fn test_prefix_scoped_clear() {
        let session = Session::new();
        let a = SessionCache::with_session(session.clone(), "a:", None);
        let b = SessionCache::with_session(session, "b:", None);
        a.set("x", CacheValue::Int(1), None);
        b.set("x", CacheValue::Int(2), None);

        assert!(a.clear());
        assert!(!a.has("x"));
        assert_eq!(b.get("x"), Some(CacheValue::Int(2)));
    }

    #[test]
    fn test_counter_round_trip() {
        let cache = SessionCache::with_session(Session::new(), "", None);
        assert_eq!(cache.increment("c", 1), 1);
        cache.set("c", CacheValue::Int(10), None);
        assert_eq!(cache.increment("c", 5), 15);
        assert_eq!(cache.decrement("c", 5), 10);
    }
}
