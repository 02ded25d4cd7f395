//! Redis driver.
//!
//! Maps the cache contract onto native commands: `GET`, `SET`/`SETEX`,
//! `EXISTS`, `DEL` and `INCRBY`/`DECRBY`. Integers are stored as decimal
//! strings so the native counters keep working after a plain `set`; every
//! other value goes through the general (bincode) encoding.
//!
//! `clear` with a prefix walks the keyspace with `SCAN MATCH` and deletes in
//! batches. That is neither atomic nor cheap on very large databases; keys
//! written while the scan runs may survive it.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use parking_lot::Mutex;
use redis::{Connection, RedisError};
use tracing::{debug, warn};

use super::CacheDriver;
use crate::cache::codec::GeneralCodec;
use crate::cache::entry::resolve_ttl;
use crate::cache::CacheValue;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::metrics;
use crate::utils::logging::redact_url;

const DRIVER: &str = "redis";
const SCAN_BATCH: usize = 500;

pub struct RedisCache {
    connection: Mutex<Connection>,
    prefix: String,
    default_ttl: Option<u64>,
    /// Connection URL with credentials masked, for logs.
    endpoint: String,
}

impl RedisCache {
    /// Connect, authenticate and select the configured database.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` if the server cannot be reached
    /// within `timeout` (unbounded when it is `0`) or rejects the handshake.
    pub fn connect(config: &CacheConfig) -> Result<Self> {
        let url = connection_url(config);
        let endpoint = redact_url(&url);
        let timeout = config.timeout_duration();

        let fail = |e: RedisError| {
            CacheError::Connection(format!(
                "Failed to connect to Redis at {}:{}: {}",
                config.host, config.port, e
            ))
        };

        let client = redis::Client::open(url.as_str()).map_err(fail)?;
        let mut connection = match timeout {
            Some(timeout) => client.get_connection_with_timeout(timeout),
            None => client.get_connection(),
        }
        .map_err(fail)?;
        connection.set_read_timeout(timeout).map_err(fail)?;
        connection.set_write_timeout(timeout).map_err(fail)?;
        redis::cmd("PING")
            .query::<String>(&mut connection)
            .map_err(fail)?;

        debug!("Connected to Redis at {}", endpoint);

        Ok(Self {
            connection: Mutex::new(connection),
            prefix: config.prefix.clone(),
            default_ttl: config.ttl,
            endpoint,
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Run one command against the shared connection.
    fn query<T: redis::FromRedisValue>(&self, command: &redis::Cmd) -> redis::RedisResult<T> {
        let mut connection = self.connection.lock();
        command.query(&mut *connection)
    }

    fn scan_prefix(&self) -> redis::RedisResult<Vec<String>> {
        let pattern = format!("{}*", escape_pattern(&self.prefix));
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = self.query(
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH),
            )?;
            keys.extend(batch);
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }

    fn counter(&self, key: &str, command: &str, by: i64) -> i64 {
        let prefixed = self.prefixed(key);
        match self.query::<i64>(redis::cmd(command).arg(&prefixed).arg(by)) {
            Ok(value) => value,
            Err(e) if is_transport_error(&e) => {
                warn!("Redis {} failed for {}: {}", command, prefixed, e);
                0
            }
            Err(e) => {
                // Stored value is not a native integer (float, blob, ...).
                debug!("Falling back to read-modify-write for {}: {}", prefixed, e);
                let delta = if command == "DECRBY" { by.saturating_neg() } else { by };
                let next = self
                    .get(key)
                    .map_or(0, |value| value.as_counter())
                    .saturating_add(delta);

                let keep_ttl = self.query::<()>(
                    redis::cmd("SET")
                        .arg(&prefixed)
                        .arg(next.to_string())
                        .arg("KEEPTTL"),
                );
                if let Err(e) = keep_ttl {
                    warn!("Redis SET failed for {}: {}", prefixed, e);
                }
                next
            }
        }
    }
}

impl Drop for RedisCache {
    fn drop(&mut self) {
        debug!("Closing Redis connection to {}", self.endpoint);
    }
}

impl CacheDriver for RedisCache {
    fn name(&self) -> &'static str {
        DRIVER
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        let prefixed = self.prefixed(key);
        let bytes = match self.query::<Option<Vec<u8>>>(redis::cmd("GET").arg(&prefixed)) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                metrics::record_miss(DRIVER);
                return None;
            }
            Err(e) => {
                warn!("Redis GET failed for {}: {}", prefixed, e);
                metrics::record_miss(DRIVER);
                return None;
            }
        };

        match decode_value(&bytes) {
            Some(value) => {
                metrics::record_hit(DRIVER);
                Some(value)
            }
            None => {
                warn!("Discarding undecodable Redis value at {}", prefixed);
                self.delete(key);
                metrics::record_miss(DRIVER);
                None
            }
        }
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<u64>) -> bool {
        let prefixed = self.prefixed(key);
        let payload = match encode_value(&value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode value for {}: {}", prefixed, e);
                metrics::record_write(DRIVER, false);
                return false;
            }
        };

        let result = match resolve_ttl(ttl, self.default_ttl) {
            // SETEX rejects 0; an entry that expires now is simply not stored.
            Some(0) => self.query::<()>(redis::cmd("DEL").arg(&prefixed)),
            Some(secs) => self.query::<()>(redis::cmd("SETEX").arg(&prefixed).arg(secs).arg(payload)),
            None => self.query::<()>(redis::cmd("SET").arg(&prefixed).arg(payload)),
        };

        match result {
            Ok(()) => {
                metrics::record_write(DRIVER, true);
                true
            }
            Err(e) => {
                warn!("Redis SET failed for {}: {}", prefixed, e);
                metrics::record_write(DRIVER, false);
                false
            }
        }
    }

    fn has(&self, key: &str) -> bool {
        let prefixed = self.prefixed(key);
        match self.query::<i64>(redis::cmd("EXISTS").arg(&prefixed)) {
            Ok(count) => count > 0,
            Err(e) => {
                warn!("Redis EXISTS failed for {}: {}", prefixed, e);
                false
            }
        }
    }

    fn delete(&self, key: &str) -> bool {
        let prefixed = self.prefixed(key);
        match self.query::<i64>(redis::cmd("DEL").arg(&prefixed)) {
            Ok(_) => {
                metrics::record_delete(DRIVER);
                true
            }
            Err(e) => {
                warn!("Redis DEL failed for {}: {}", prefixed, e);
                false
            }
        }
    }

    fn clear(&self) -> bool {
        if self.prefix.is_empty() {
            return match self.query::<()>(&redis::cmd("FLUSHDB")) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Redis FLUSHDB failed: {}", e);
                    false
                }
            };
        }

        let keys = match self.scan_prefix() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Redis SCAN failed for prefix {:?}: {}", self.prefix, e);
                return false;
            }
        };

        for batch in keys.chunks(SCAN_BATCH) {
            if let Err(e) = self.query::<i64>(redis::cmd("DEL").arg(batch)) {
                warn!("Redis DEL failed while clearing {:?}: {}", self.prefix, e);
                return false;
            }
        }

        debug!("Cleared {} Redis keys under prefix {:?}", keys.len(), self.prefix);
        true
    }

    fn increment(&self, key: &str, by: i64) -> i64 {
        self.counter(key, "INCRBY", by)
    }

    fn decrement(&self, key: &str, by: i64) -> i64 {
        self.counter(key, "DECRBY", by)
    }
}

/// `redis://[:password@]host:port/database`
pub fn connection_url(config: &CacheConfig) -> String {
    let auth = match config.password.as_deref() {
        Some(password) if !password.is_empty() => {
            format!(":{}@", urlencoding::encode(password))
        }
        _ => String::new(),
    };
    format!(
        "redis://{}{}:{}/{}",
        auth, config.host, config.port, config.database
    )
}

/// Escape glob metacharacters so a prefix matches literally in `SCAN MATCH`.
fn escape_pattern(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn encode_value(value: &CacheValue) -> Result<Vec<u8>> {
    match value {
        CacheValue::Int(i) => Ok(i.to_string().into_bytes()),
        other => GeneralCodec::encode_value(other),
    }
}

/// Decimal strings are native counters; anything else must be bincode.
fn decode_value(bytes: &[u8]) -> Option<CacheValue> {
    if let Some(i) = std::str::from_utf8(bytes).ok().and_then(|s| s.parse::<i64>().ok()) {
        return Some(CacheValue::Int(i));
    }
    GeneralCodec::decode_value(bytes).ok()
}

fn is_transport_error(e: &RedisError) -> bool {
    e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
}
