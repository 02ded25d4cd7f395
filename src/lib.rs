// stashkit - Pluggable TTL key-value cache
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod error;
pub mod metrics;
pub mod session;
pub mod utils;

pub use cache::{facade, CacheManager, CacheValue, DriverKind};
pub use config::CacheConfig;
pub use drivers::CacheDriver;
pub use error::{CacheError, Result};
