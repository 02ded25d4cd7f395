//! Cache drivers: one implementation of [`CacheDriver`] per storage medium.
//!
//! - `memory`: in-process map, the reference semantics for TTL and `remember`.
//! - `file`: two-tier (bounded memory map in front of sharded files).
//! - `session`: bucket inside the thread's bound `Session`.
//! - `redis`: remote key-value store over the `redis` crate.
//!
//! Drivers only fail while being constructed. After that every operation
//! reports trouble by returning a miss, `false`, or (for counters) the best
//! value it could compute, and logs the cause.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod file;
pub mod memory;
pub mod redis;
pub mod session;

pub use file::FileCache;
pub use memory::MemoryCache;
pub use redis::RedisCache;
pub use session::SessionCache;

use crate::cache::CacheValue;

/// Producer passed to [`CacheDriver::remember`].
pub type Producer<'a> = Box<dyn FnOnce() -> CacheValue + 'a>;

/// Operations shared by every backend.
///
/// `remember` and `increment`/`decrement` are read-then-write sequences on
/// every backend except Redis counters. Two processes racing on the same key
/// may both run the producer or lose an increment.
pub trait CacheDriver: Send + Sync {
    /// Short backend name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Live value for `key`, or `None` if absent or expired. Expired entries
    /// are removed as a side effect.
    fn get(&self, key: &str) -> Option<CacheValue>;

    /// Store `value`. `ttl` falls back to the driver default, then to
    /// "never expires". Returns `false` when the medium rejected the write.
    fn set(&self, key: &str, value: CacheValue, ttl: Option<u64>) -> bool;

    /// Idempotent: deleting a missing key is a success.
    fn delete(&self, key: &str) -> bool;

    /// Remove every key under this driver's prefix, or everything when the
    /// prefix is empty.
    fn clear(&self) -> bool;

    /// Add `by` to the integer reading of the current value (0 if absent)
    /// and store the result without touching the entry's expiry.
    fn increment(&self, key: &str, by: i64) -> i64;

    fn decrement(&self, key: &str, by: i64) -> i64 {
        self.increment(key, by.saturating_neg())
    }

    fn get_or(&self, key: &str, default: CacheValue) -> CacheValue {
        self.get(key).unwrap_or(default)
    }

    /// A stored `Null` and a missing key look the same here.
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }

    /// Return the live value, or run `producer` once, store its result with
    /// `ttl` and return it.
    fn remember(&self, key: &str, ttl: Option<u64>, producer: Producer<'_>) -> CacheValue {
        if let Some(value) = self.get(key).filter(|v| !v.is_null()) {
            return value;
        }

        let value = producer();
        self.set(key, value.clone(), ttl);
        value
    }

    /// Remove expired entries eagerly. Returns how many were dropped.
    fn clean_expired(&self) -> usize {
        0
    }

    fn get_many(&self, keys: &[&str], default: CacheValue) -> Vec<(String, CacheValue)> {
        keys.iter()
            .map(|key| (key.to_string(), self.get_or(key, default.clone())))
            .collect()
    }

    /// `true` only if every write succeeded.
    fn set_many(&self, values: Vec<(String, CacheValue)>, ttl: Option<u64>) -> bool {
        values
            .into_iter()
            .fold(true, |ok, (key, value)| self.set(&key, value, ttl) && ok)
    }

    fn delete_many(&self, keys: &[&str]) -> bool {
        keys.iter().fold(true, |ok, key| self.delete(key) && ok)
    }
}
