//! Configuration data structures for stashkit.
//!
//! This module defines the schema for the cache settings consumed by
//! `CacheManager`, plus the logging section used by the binary.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Cache driver selection and driver-specific settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings consumed by `CacheManager` when it builds a driver.
///
/// Only the fields relevant to the selected driver are read; the rest keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend name: `array`/`memory`, `file`, `session` or `redis`.
    /// Default: `file`
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Namespace prepended to every key before it reaches the medium.
    /// Default: empty
    #[serde(default)]
    pub prefix: String,

    /// Seconds-to-live applied when an operation omits an explicit TTL.
    /// Default: none (entries never expire)
    #[serde(default)]
    pub ttl: Option<u64>,

    /// Root directory for the file driver.
    /// Default: `<tmp>/stashkit-cache`
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Capacity of the file driver's in-process tier.
    /// Default: `1000`
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,

    /// Redis host.
    /// Default: `127.0.0.1`
    #[serde(default = "default_host")]
    pub host: String,

    /// Redis port.
    /// Default: `6379`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Redis password, if the server requires AUTH.
    #[serde(default)]
    pub password: Option<String>,

    /// Redis logical database index.
    /// Default: `0`
    #[serde(default)]
    pub database: i64,

    /// Redis connect/read/write timeout in seconds; `0` waits indefinitely.
    /// Default: `2.5`
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

impl CacheConfig {
    /// Config for the given driver with every other field at its default.
    pub fn for_driver(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Option<u64>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// `timeout` as a `Duration`, or `None` for `0` (no timeout). Negative
    /// or non-finite values fall back to the default.
    pub fn timeout_duration(&self) -> Option<Duration> {
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_timeout()));
        (!timeout.is_zero()).then_some(timeout)
    }
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            prefix: String::new(),
            ttl: None,
            path: default_path(),
            memory_limit: default_memory_limit(),
            host: default_host(),
            port: default_port(),
            password: None,
            database: 0,
            timeout: default_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults
fn default_driver() -> String {
    "file".to_string()
}

fn default_path() -> PathBuf {
    std::env::temp_dir().join("stashkit-cache")
}

fn default_memory_limit() -> usize {
    1000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_timeout() -> f64 {
    2.5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
