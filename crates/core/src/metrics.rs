//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Production (submissions, polls, artifact fetches, pipelines)
//! - Publishing (upload attempts, credential rotation)
//! - External services (generation backend, publishing backend)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Production Metrics
// =============================================================================

/// Task submissions by result.
pub static SUBMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpilot_submissions_total",
            "Total generation task submissions",
        ),
        &["result"], // "accepted", "rejected", "transport_error"
    )
    .unwrap()
});

/// Status polls by outcome.
pub static POLL_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpilot_poll_attempts_total", "Total task status polls"),
        &["outcome"], // "pending", "matched", "failed", "skipped"
    )
    .unwrap()
});

/// Polls that hit the timeout ceiling.
pub static POLL_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelpilot_poll_timeouts_total",
        "Tasks abandoned after the poll timeout",
    )
    .unwrap()
});

/// Artifact fetches by result.
pub static ARTIFACT_FETCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpilot_artifact_fetches_total",
            "Total artifact fetches",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Pipeline duration (submit to terminal state) in seconds.
pub static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelpilot_pipeline_duration_seconds",
            "Duration of production pipelines",
        )
        .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Failed pipelines by failure kind.
pub static PIPELINE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpilot_pipeline_failures_total",
            "Failed production pipelines by failure kind",
        ),
        &["kind"], // "submission", "poll_timeout", "cancelled", ...
    )
    .unwrap()
});

/// Production batches started.
pub static PRODUCTION_BATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpilot_production_batches_total",
            "Total production batches started",
        ),
        &["mode"], // "live", "simulation"
    )
    .unwrap()
});

// =============================================================================
// Publishing Metrics
// =============================================================================

/// Upload attempts by result (one per credential tried).
pub static PUBLISH_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpilot_publish_attempts_total",
            "Total publish attempts",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Items published by final outcome.
pub static ITEMS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpilot_items_published_total",
            "Items that finished a publish batch",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Publishing credentials dropped from a batch working copy.
pub static CREDENTIAL_DISCARDS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelpilot_credential_discards_total",
        "Publishing credentials discarded during rotation",
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelpilot_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpilot_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record one external call.
pub fn observe_external(service: &str, operation: &str, success: bool, secs: f64) {
    EXTERNAL_SERVICE_DURATION
        .with_label_values(&[service, operation])
        .observe(secs);
    EXTERNAL_SERVICE_REQUESTS
        .with_label_values(&[service, operation, if success { "success" } else { "error" }])
        .inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Production
        Box::new(SUBMISSIONS_TOTAL.clone()),
        Box::new(POLL_ATTEMPTS_TOTAL.clone()),
        Box::new(POLL_TIMEOUTS.clone()),
        Box::new(ARTIFACT_FETCHES_TOTAL.clone()),
        Box::new(PIPELINE_DURATION.clone()),
        Box::new(PIPELINE_FAILURES.clone()),
        Box::new(PRODUCTION_BATCHES.clone()),
        // Publishing
        Box::new(PUBLISH_ATTEMPTS_TOTAL.clone()),
        Box::new(ITEMS_PUBLISHED_TOTAL.clone()),
        Box::new(CREDENTIAL_DISCARDS.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}
