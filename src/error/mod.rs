// Error types for stashkit
// Author: kelexine (https://github.com/kelexine)
//
// Only construction and driver resolution surface these. Once a driver is
// built, every operation degrades to a miss or a `false` return instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Unsupported cache driver: {0}")]
    UnsupportedDriver(String),

    #[error("Cache directory error at {}: {reason}", .path.display())]
    Directory { path: PathBuf, reason: String },

    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),
}

impl CacheError {
    /// Shorthand for directory failures raised while preparing a cache root.
    pub fn directory(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CacheError::Directory {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that happen while building a driver, as opposed to
    /// configuration lookups.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            CacheError::Directory { .. } | CacheError::Connection(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
