//! Driver selection model.

// Author: kelexine (https://github.com/kelexine)

use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;

/// Backends a `CacheManager` can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    /// In-process map (`array` or `memory`).
    Memory,
    /// Sharded files behind a bounded memory tier.
    File,
    /// Bucket inside the thread's bound session.
    Session,
    /// Remote Redis server.
    Redis,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Memory => "memory",
            DriverKind::File => "file",
            DriverKind::Session => "session",
            DriverKind::Redis => "redis",
        }
    }
}

impl FromStr for DriverKind {
    type Err = CacheError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "array" | "memory" => Ok(DriverKind::Memory),
            "file" => Ok(DriverKind::File),
            "session" => Ok(DriverKind::Session),
            "redis" => Ok(DriverKind::Redis),
            other => Err(CacheError::UnsupportedDriver(other.to_string())),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
