// Cache management module
// Author: kelexine (https://github.com/kelexine)

pub mod codec;
pub mod entry;
pub mod facade;
pub mod manager;
pub mod models;
pub mod value;

pub use entry::CacheEntry;
pub use manager::CacheManager;
pub use models::DriverKind;
pub use value::CacheValue;
