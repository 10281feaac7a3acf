//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Fetch client (attempts by outcome, latency)
//! - Orchestrator (items, batches, jobs, retries)
//! - Artifact cache (writes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Fetch Client Metrics
// =============================================================================

/// Fetch attempts total by outcome.
pub static FETCH_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_fetch_attempts_total", "Total fetch attempts"),
        // "live", "not_found", "rate_limited", "transient",
        // "fallback_access_denied", "fallback_timeout"
        &["outcome"],
    )
    .unwrap()
});

/// Fetch duration in seconds.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "harvester_fetch_duration_seconds",
            "Duration of a single provider call",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Items finished total by result.
pub static ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_items_total", "Total items with a terminal outcome"),
        &["result"], // "success", "failed", "skipped"
    )
    .unwrap()
});

/// Batch duration in seconds, from first worker start to join.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("harvester_batch_duration_seconds", "Duration of one batch")
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &[],
    )
    .unwrap()
});

/// Jobs finished total by final status.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_jobs_finished_total", "Total jobs finished"),
        &["status"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

/// Retries total by reason.
pub static RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_retries_total", "Total fetch retries"),
        &["reason"], // "rate_limited", "transient"
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics
// =============================================================================

/// Cache writes total by result.
pub static CACHE_WRITES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_cache_writes_total", "Total artifact cache writes"),
        &["result"], // "inserted", "unchanged", "overwritten"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Fetch client
        Box::new(FETCH_ATTEMPTS.clone()),
        Box::new(FETCH_DURATION.clone()),
        // Orchestrator
        Box::new(ITEMS_TOTAL.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(RETRIES.clone()),
        // Cache
        Box::new(CACHE_WRITES.clone()),
    ]
}
