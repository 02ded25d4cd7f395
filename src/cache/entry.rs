// Cache entry: value + absolute expiry
// Author: kelexine (https://github.com/kelexine)

use super::value::CacheValue;
use serde::{Deserialize, Serialize};

/// Current UTC time in epoch seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Pick the TTL for a write: explicit, then the driver default, then none.
pub fn resolve_ttl(ttl: Option<u64>, default_ttl: Option<u64>) -> Option<u64> {
    ttl.or(default_ttl)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: CacheValue,
    /// Epoch seconds; `None` never expires.
    pub expires_at: Option<i64>,
}

impl CacheEntry {
    pub fn new(value: CacheValue, expires_at: Option<i64>) -> Self {
        Self { value, expires_at }
    }

    /// Entry expiring `ttl` seconds from now.
    pub fn with_ttl(value: CacheValue, ttl: Option<u64>) -> Self {
        let expires_at = ttl.map(|secs| now().saturating_add(i64::try_from(secs).unwrap_or(i64::MAX)));
        Self { value, expires_at }
    }

    /// Live iff it never expires or its expiry has not passed yet.
    pub fn is_live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |expires| expires >= now)
    }

    /// Counter update: same expiry, new integer value.
    pub fn adjusted(&self, by: i64) -> Self {
        Self {
            value: CacheValue::Int(self.value.as_counter().saturating_add(by)),
            expires_at: self.expires_at,
        }
    }
}
