// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_gauge_vec_with_registry, CounterVec, Encoder,
    GaugeVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Cache operations per driver
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_operations_total", "Total cache operations"),
        &["driver", "operation"], // operation: hit, miss, write, write_failure, delete, expired, evict
        REGISTRY
    ).unwrap();

    /// Entries currently held in a driver's in-process tier
    pub static ref CACHE_MEMORY_ENTRIES: GaugeVec = register_gauge_vec_with_registry!(
        Opts::new("cache_memory_entries", "Entries held in the in-process cache tier"),
        &["driver"],
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        CACHE_OPERATIONS.with_label_values(&["test", "hit"]).inc();
        CACHE_MEMORY_ENTRIES.with_label_values(&["test"]).set(1.0);

        let metrics = gather_metrics();
        assert!(metrics.contains("cache_operations_total"));
        assert!(metrics.contains("cache_memory_entries"));
    }
}
