// Cache manager - resolves the configured driver and forwards operations
// Author: kelexine (https://github.com/kelexine)

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::models::DriverKind;
use crate::cache::CacheValue;
use crate::config::CacheConfig;
use crate::drivers::{CacheDriver, FileCache, MemoryCache, RedisCache, SessionCache};
use crate::error::Result;

/// Owns the cache configuration and the active driver instance.
///
/// The driver is built on first use and reused for as long as callers keep
/// asking for the same backend. Asking for a different backend replaces it.
pub struct CacheManager {
    config: CacheConfig,
    active: Mutex<Option<(DriverKind, Arc<dyn CacheDriver>)>>,
}

impl CacheManager {
    /// Create a manager. No driver is built until the first operation.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resolve a driver by name, or the configured default when `name` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// `CacheError::UnsupportedDriver` for unknown names, or whatever the
    /// driver's constructor reports (unwritable directory, unreachable
    /// Redis server).
    pub fn driver(&self, name: Option<&str>) -> Result<Arc<dyn CacheDriver>> {
        let kind: DriverKind = name.unwrap_or(self.config.driver.as_str()).parse()?;

        let mut active = self.active.lock();
        if let Some((active_kind, driver)) = active.as_ref() {
            if *active_kind == kind {
                return Ok(Arc::clone(driver));
            }
        }

        let driver = self.create_driver(kind)?;
        info!("Cache driver ready: {} (prefix: {:?})", kind, self.config.prefix);
        *active = Some((kind, Arc::clone(&driver)));
        Ok(driver)
    }

    fn create_driver(&self, kind: DriverKind) -> Result<Arc<dyn CacheDriver>> {
        debug!("Building {} cache driver", kind);
        let config = &self.config;

        let driver: Arc<dyn CacheDriver> = match kind {
            DriverKind::Memory => Arc::new(MemoryCache::new(config.prefix.clone(), config.ttl)),
            DriverKind::File => Arc::new(FileCache::from_config(config)?),
            DriverKind::Session => Arc::new(SessionCache::new(config.prefix.clone(), config.ttl)),
            DriverKind::Redis => Arc::new(RedisCache::connect(config)?),
        };
        Ok(driver)
    }

    fn active_driver(&self) -> Result<Arc<dyn CacheDriver>> {
        self.driver(None)
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        Ok(self.active_driver()?.get(key))
    }

    pub fn get_or(&self, key: &str, default: impl Into<CacheValue>) -> Result<CacheValue> {
        Ok(self.active_driver()?.get_or(key, default.into()))
    }

    pub fn set(&self, key: &str, value: impl Into<CacheValue>, ttl: Option<u64>) -> Result<bool> {
        Ok(self.active_driver()?.set(key, value.into(), ttl))
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.active_driver()?.has(key))
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.active_driver()?.delete(key))
    }

    pub fn clear(&self) -> Result<bool> {
        Ok(self.active_driver()?.clear())
    }

    pub fn remember<F>(&self, key: &str, ttl: Option<u64>, producer: F) -> Result<CacheValue>
    where
        F: FnOnce() -> CacheValue,
    {
        Ok(self.active_driver()?.remember(key, ttl, Box::new(producer)))
    }

    pub fn increment(&self, key: &str, by: i64) -> Result<i64> {
        Ok(self.active_driver()?.increment(key, by))
    }

    pub fn decrement(&self, key: &str, by: i64) -> Result<i64> {
        Ok(self.active_driver()?.decrement(key, by))
    }

    pub fn clean_expired(&self) -> Result<usize> {
        Ok(self.active_driver()?.clean_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[test]
    fn test_driver_instance_is_cached() {
        let manager = CacheManager::new(CacheConfig::for_driver("array"));

        let first = manager.driver(None).unwrap();
        let second = manager.driver(Some("memory")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_switching_driver_replaces_instance() {
        let manager = CacheManager::new(CacheConfig::for_driver("array"));
        manager.set("k", 1i64, None).unwrap();

        let session = manager.driver(Some("session")).unwrap();
        assert_eq!(session.name(), "session");

        // Back to memory: a fresh store, the old entry is gone.
        let memory = manager.driver(Some("array")).unwrap();
        assert_eq!(memory.name(), "memory");
        assert_eq!(manager.get("k").unwrap(), None);
    }

    #[test]
    fn test_unknown_driver_is_fatal() {
        let manager = CacheManager::new(CacheConfig::for_driver("nope"));
        assert!(matches!(manager.get("k"), Err(CacheError::UnsupportedDriver(_))));
    }
}
