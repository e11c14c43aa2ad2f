//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Sessions (starts, endings, start failures, forced progress flushes)
//! - Queues (items started, skipped, failed)
//! - Executor bridge requests

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Session Metrics
// =============================================================================

/// Sessions that reached the active phase, by kind.
pub static SESSIONS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("questline_sessions_started_total", "Total sessions started"),
        &["kind"], // "video", "stream", "game_simulated", "game_heartbeat"
    )
    .unwrap()
});

/// Sessions torn down, by stop reason.
pub static SESSIONS_ENDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("questline_sessions_ended_total", "Total sessions ended"),
        &["reason"],
    )
    .unwrap()
});

/// Starts that failed before the session became active, by kind.
pub static START_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("questline_start_failures_total", "Total failed session starts"),
        &["kind"],
    )
    .unwrap()
});

/// Final progress flushes issued during teardown.
pub static FORCE_SUBMITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "questline_force_submits_total",
        "Total forced progress submissions",
    )
    .unwrap()
});

// =============================================================================
// Queue Metrics
// =============================================================================

/// Queue items processed, by queue and outcome.
pub static QUEUE_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("questline_queue_items_total", "Total queue items processed"),
        &["queue", "outcome"], // outcome: "started", "skipped", "failed", "finished"
    )
    .unwrap()
});

// =============================================================================
// Executor Bridge Metrics
// =============================================================================

/// Executor bridge request duration in seconds.
pub static EXECUTOR_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "questline_executor_request_duration_seconds",
            "Duration of executor bridge requests",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["command"],
    )
    .unwrap()
});

/// Executor bridge requests, by command and result.
pub static EXECUTOR_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "questline_executor_requests_total",
            "Total executor bridge requests",
        ),
        &["command", "result"], // result: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Sessions
        Box::new(SESSIONS_STARTED.clone()),
        Box::new(SESSIONS_ENDED.clone()),
        Box::new(START_FAILURES.clone()),
        Box::new(FORCE_SUBMITS.clone()),
        // Queues
        Box::new(QUEUE_ITEMS.clone()),
        // Executor bridge
        Box::new(EXECUTOR_REQUEST_DURATION.clone()),
        Box::new(EXECUTOR_REQUESTS.clone()),
    ]
}
