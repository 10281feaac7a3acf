//! Prometheus metrics for observability.
//!
//! Server-side metrics cover HTTP traffic and gauges sampled from the
//! orchestrator and the artifact cache at scrape time. Fetch, batch and job
//! counters live in `harvester_core::metrics` and are registered here too.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "harvester_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "harvester_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics (collected dynamically)
// =============================================================================

/// Scheduling loop state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "harvester_orchestrator_running",
        "Whether the scheduling loop is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Jobs by lifecycle state.
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("harvester_jobs_by_status", "Current job count by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics (collected dynamically)
// =============================================================================

/// Cached artifacts by provenance.
pub static CACHE_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("harvester_cache_entries", "Cached artifacts by provenance"),
        &["provenance"],
    )
    .unwrap()
});

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Orchestrator
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(JOBS_BY_STATUS.clone()))
        .unwrap();

    // Cache
    registry.register(Box::new(CACHE_ENTRIES.clone())).unwrap();

    // Core metrics (fetch client, orchestrator, cache writes)
    for metric in harvester_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Sample gauges from current application state.
///
/// Called right before encoding so a scrape sees fresh values.
pub fn collect_dynamic_metrics(state: &AppState) {
    let status = state.orchestrator().status();
    ORCHESTRATOR_RUNNING.set(if status.running { 1 } else { 0 });
    JOBS_BY_STATUS
        .with_label_values(&["pending"])
        .set(status.pending_count as i64);
    JOBS_BY_STATUS
        .with_label_values(&["running"])
        .set(status.running_count as i64);
    JOBS_BY_STATUS
        .with_label_values(&["paused"])
        .set(status.paused_count as i64);

    let stats = state.cache().stats();
    CACHE_ENTRIES
        .with_label_values(&["live"])
        .set(stats.live as i64);
    CACHE_ENTRIES
        .with_label_values(&["fallback"])
        .set(stats.fallback as i64);
}

/// Normalize a path for metric labels (replace job IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    UUID_PATTERN.replace_all(path, "{id}").into_owned()
}
