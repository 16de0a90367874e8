//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the reelpilot server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Item and credential gauges (collected on scrape)
//! - Engine metrics registered from `reelpilot_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

use reelpilot_core::{CredentialKind, ItemStatus, PublishStatus};

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
            "reelpilot_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpilot_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelpilot_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelpilot_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelpilot_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpilot_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelpilot_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Session Metrics (collected dynamically)
// =============================================================================

/// Items in the current batch by production status.
pub static ITEMS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("reelpilot_items_by_status", "Current item count by status"),
        &["status"],
    )
    .unwrap()
});

/// Items in the current batch by publish status.
pub static ITEMS_BY_PUBLISH_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "reelpilot_items_by_publish_status",
            "Current item count by publish status",
        ),
        &["status"],
    )
    .unwrap()
});

/// Configured credentials per pool.
pub static CREDENTIALS_CONFIGURED: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "reelpilot_credentials_configured",
            "Number of credentials in each persisted pool",
        ),
        &["kind"],
    )
    .unwrap()
});

/// Simulation mode (1 = on, 0 = off).
pub static SIMULATION_ENABLED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelpilot_simulation_enabled",
        "Whether simulation mode is on (1) or off (0)",
    )
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

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Session
    registry
        .register(Box::new(ITEMS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(ITEMS_BY_PUBLISH_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(CREDENTIALS_CONFIGURED.clone()))
        .unwrap();
    registry
        .register(Box::new(SIMULATION_ENABLED.clone()))
        .unwrap();

    // Core metrics (production, publishing, external services)
    for metric in reelpilot_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges from the current session before encoding.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let session = state.session();
    let items = session.items().await;

    for status in [
        ItemStatus::Idle,
        ItemStatus::Processing,
        ItemStatus::Monitoring,
        ItemStatus::Completed,
        ItemStatus::Error,
    ] {
        let count = items.iter().filter(|i| i.state.status == status).count();
        ITEMS_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }

    for status in [
        PublishStatus::None,
        PublishStatus::Uploading,
        PublishStatus::Success,
        PublishStatus::Failed,
    ] {
        let count = items
            .iter()
            .filter(|i| i.state.publish_status == status)
            .count();
        ITEMS_BY_PUBLISH_STATUS
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }

    for kind in [CredentialKind::Generation, CredentialKind::Publishing] {
        CREDENTIALS_CONFIGURED
            .with_label_values(&[kind.as_str()])
            .set(session.credentials(kind).await.len() as i64);
    }

    SIMULATION_ENABLED.set(if session.use_simulation().await { 1 } else { 0 });
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let item_regex = regex_lite::Regex::new(r"/items/[^/]+").unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = item_regex.replace_all(&result, "/items/{id}");
    let result = numeric_regex.replace_all(&result, "/{index}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/items/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/items/{id}");
    }

    #[test]
    fn test_normalize_path_item_with_suffix() {
        let path = "/api/v1/items/video-3/publish-time";
        assert_eq!(normalize_path(path), "/api/v1/items/{id}/publish-time");
    }

    #[test]
    fn test_normalize_path_credential_index() {
        let path = "/api/v1/credentials/publishing/2";
        assert_eq!(normalize_path(path), "/api/v1/credentials/publishing/{index}");
    }

    #[test]
    fn test_registry_includes_core_metrics() {
        reelpilot_core::metrics::POLL_TIMEOUTS.inc();
        let names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "reelpilot_poll_timeouts_total"));
        assert!(names.iter().any(|n| n == "reelpilot_ws_connections_total"));
    }
}
