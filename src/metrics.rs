//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Upload Metrics
    pub static ref UPLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("photosync_uploads_total", "Total number of upload attempts"),
        &["pathway", "result"]
    ).expect("metric can be created");
    pub static ref UPLOAD_QUEUE_LENGTH: IntGauge = IntGauge::new(
        "photosync_upload_queue_length",
        "Items currently persisted in the upload queue"
    ).expect("metric can be created");
    pub static ref UPLOAD_QUEUE_ABANDONED: IntGauge = IntGauge::new(
        "photosync_upload_queue_abandoned",
        "Queue items that exhausted their retries"
    ).expect("metric can be created");

    // Listing Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounter = IntCounter::new(
        "photosync_listing_cache_hits_total",
        "Listing cache reads served from storage"
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounter = IntCounter::new(
        "photosync_listing_cache_misses_total",
        "Listing cache reads with nothing stored"
    ).expect("metric can be created");
    pub static ref CACHE_EXPIRED_TOTAL: IntCounter = IntCounter::new(
        "photosync_listing_cache_expired_total",
        "Listing cache entries dropped for age"
    ).expect("metric can be created");

    // Remote API Metrics
    pub static ref REMOTE_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("photosync_remote_requests_total", "Requests sent to the photo server"),
        &["endpoint", "status"]
    ).expect("metric can be created");
}

/// Register all metrics with the global registry
///
/// Safe to call more than once; repeated registrations are ignored.
pub fn init_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(UPLOADS_TOTAL.clone()),
        Box::new(UPLOAD_QUEUE_LENGTH.clone()),
        Box::new(UPLOAD_QUEUE_ABANDONED.clone()),
        Box::new(CACHE_HITS_TOTAL.clone()),
        Box::new(CACHE_MISSES_TOTAL.clone()),
        Box::new(CACHE_EXPIRED_TOTAL.clone()),
        Box::new(REMOTE_REQUESTS_TOTAL.clone()),
    ];

    for collector in collectors {
        if let Err(error) = REGISTRY.register(collector) {
            tracing::debug!(%error, "Metric already registered");
        }
    }
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(error) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(%error, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_text_includes_registered_counters() {
        init_metrics();
        init_metrics();
        UPLOADS_TOTAL.with_label_values(&["queue", "success"]).inc();

        let text = gather_text();
        assert!(text.contains("photosync_uploads_total"));
    }
}
