// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{gather_metrics, CACHE_MEMORY_ENTRIES, CACHE_OPERATIONS};

/// Helpers to record cache operations
pub fn record_hit(driver: &str) {
    CACHE_OPERATIONS.with_label_values(&[driver, "hit"]).inc();
}

pub fn record_miss(driver: &str) {
    CACHE_OPERATIONS.with_label_values(&[driver, "miss"]).inc();
}

pub fn record_write(driver: &str, success: bool) {
    let operation = if success { "write" } else { "write_failure" };
    CACHE_OPERATIONS.with_label_values(&[driver, operation]).inc();
}

pub fn record_delete(driver: &str) {
    CACHE_OPERATIONS.with_label_values(&[driver, "delete"]).inc();
}

pub fn record_expired(driver: &str, count: usize) {
    if count > 0 {
        CACHE_OPERATIONS
            .with_label_values(&[driver, "expired"])
            .inc_by(count as f64);
    }
}

pub fn record_eviction(driver: &str) {
    CACHE_OPERATIONS.with_label_values(&[driver, "evict"]).inc();
}

pub fn update_memory_entries(driver: &str, count: usize) {
    CACHE_MEMORY_ENTRIES
        .with_label_values(&[driver])
        .set(count as f64);
}
