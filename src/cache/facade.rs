// Process-wide default cache manager
// Author: kelexine (https://github.com/kelexine)
//
// Code that can take a `CacheManager` handle should do so. These free
// functions are for call sites that cannot, and all share one instance that
// is created on first use or installed with `set_instance`.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use super::manager::CacheManager;
use super::CacheValue;
use crate::config::CacheConfig;
use crate::drivers::CacheDriver;
use crate::error::Result;

static INSTANCE: Lazy<RwLock<Option<Arc<CacheManager>>>> = Lazy::new(|| RwLock::new(None));

/// Build a standalone manager that is not registered as the default.
pub fn make(config: CacheConfig) -> CacheManager {
    CacheManager::new(config)
}

/// The shared manager, created with default settings on first use.
pub fn instance() -> Arc<CacheManager> {
    instance_with(CacheConfig::default())
}

/// The shared manager, created from `config` if it does not exist yet.
/// `config` is ignored once an instance is installed.
pub fn instance_with(config: CacheConfig) -> Arc<CacheManager> {
    if let Some(manager) = INSTANCE.read().as_ref() {
        return Arc::clone(manager);
    }

    let mut slot = INSTANCE.write();
    let manager = slot.get_or_insert_with(|| {
        debug!("Creating default cache manager (driver: {})", config.driver);
        Arc::new(CacheManager::new(config))
    });
    Arc::clone(manager)
}

/// Replace the shared manager wholesale.
pub fn set_instance(manager: CacheManager) -> Arc<CacheManager> {
    let manager = Arc::new(manager);
    *INSTANCE.write() = Some(Arc::clone(&manager));
    manager
}

/// Drop the shared manager; the next call creates a fresh one.
pub fn reset_instance() -> Option<Arc<CacheManager>> {
    INSTANCE.write().take()
}

pub fn driver(name: Option<&str>) -> Result<Arc<dyn CacheDriver>> {
    instance().driver(name)
}

pub fn get(key: &str) -> Result<Option<CacheValue>> {
    instance().get(key)
}

pub fn get_or(key: &str, default: impl Into<CacheValue>) -> Result<CacheValue> {
    instance().get_or(key, default)
}

pub fn set(key: &str, value: impl Into<CacheValue>, ttl: Option<u64>) -> Result<bool> {
    instance().set(key, value, ttl)
}

pub fn has(key: &str) -> Result<bool> {
    instance().has(key)
}

pub fn delete(key: &str) -> Result<bool> {
    instance().delete(key)
}

pub fn clear() -> Result<bool> {
    instance().clear()
}

pub fn remember<F>(key: &str, ttl: Option<u64>, producer: F) -> Result<CacheValue>
where
    F: FnOnce() -> CacheValue,
{
    instance().remember(key, ttl, producer)
}

pub fn increment(key: &str, by: i64) -> Result<i64> {
    instance().increment(key, by)
}

pub fn decrement(key: &str, by: i64) -> Result<i64> {
    instance().decrement(key, by)
}
