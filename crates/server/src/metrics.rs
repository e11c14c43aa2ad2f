//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the questline server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Executor signal webhook traffic
//! - Session and queue state (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use questline_core::{QueueKind, SessionPhase};

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
            "questline_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("questline_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "questline_http_requests_in_flight",
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
        "questline_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "questline_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("questline_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "questline_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Executor Signal Metrics
// =============================================================================

/// Signals received on the executor webhook, by kind.
pub static SIGNALS_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "questline_executor_signals_received_total",
            "Executor signals received on the webhook",
        ),
        &["kind"], // "progress", "complete", "error"
    )
    .unwrap()
});

// =============================================================================
// Session Metrics (collected dynamically)
// =============================================================================

/// Whether a session is active (1) or not (0).
pub static SESSION_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "questline_session_active",
        "Whether a quest session is active (1) or idle (0)",
    )
    .unwrap()
});

/// Local progress of the active session, in whole percent.
pub static SESSION_PROGRESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "questline_session_progress_percent",
        "Local progress of the active session",
    )
    .unwrap()
});

/// Pending items per queue.
pub static QUEUE_LENGTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("questline_queue_length", "Pending items per queue"),
        &["queue"],
    )
    .unwrap()
});

/// Whether each queue is running.
pub static QUEUE_RUNNING: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("questline_queue_running", "Whether the queue is running (1) or not (0)"),
        &["queue"],
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

    // Signals
    registry
        .register(Box::new(SIGNALS_RECEIVED.clone()))
        .unwrap();

    // Session and queues
    registry.register(Box::new(SESSION_ACTIVE.clone())).unwrap();
    registry
        .register(Box::new(SESSION_PROGRESS.clone()))
        .unwrap();
    registry.register(Box::new(QUEUE_LENGTH.clone())).unwrap();
    registry.register(Box::new(QUEUE_RUNNING.clone())).unwrap();

    // Core metrics (sessions, queues, executor bridge)
    for metric in questline_core::metrics::all_metrics() {
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

/// Collect dynamic metrics from the orchestrator's current status.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status().await;

    let active = status.phase == SessionPhase::Active;
    SESSION_ACTIVE.set(i64::from(active));
    SESSION_PROGRESS.set(if active {
        status.local_progress_pct.floor() as i64
    } else {
        0
    });

    for (kind, queue) in [
        (QueueKind::Video, &status.video_queue),
        (QueueKind::Play, &status.play_queue),
    ] {
        QUEUE_LENGTH
            .with_label_values(&[kind.as_str()])
            .set(queue.quest_ids.len() as i64);
        QUEUE_RUNNING
            .with_label_values(&[kind.as_str()])
            .set(i64::from(queue.running));
    }
}

/// Normalize a path for metric labels (replace quest ids with a placeholder).
///
/// Quest ids are numeric snowflakes, so any all-digit segment is an id.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
