//! Webhook the executor bridge posts its pushed signals to.

use axum::{extract::State, http::StatusCode, Json};
use questline_core::ExecutorSignal;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::metrics::SIGNALS_RECEIVED;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SignalAck {
    /// How many live subscriptions saw the signal (0 when no session listens).
    pub delivered: usize,
}

/// Publish an executor signal (`{"type":"progress","value":42.5}`,
/// `{"type":"complete"}`, `{"type":"error","value":"..."}`).
pub async fn receive_signal(
    State(state): State<Arc<AppState>>,
    Json(signal): Json<ExecutorSignal>,
) -> (StatusCode, Json<SignalAck>) {
    let kind = match &signal {
        ExecutorSignal::Progress(_) => "progress",
        ExecutorSignal::Complete => "complete",
        ExecutorSignal::Error(_) => "error",
    };
    SIGNALS_RECEIVED.with_label_values(&[kind]).inc();

    let delivered = state.signals().publish(signal);
    debug!("Executor {} signal delivered to {} listeners", kind, delivered);
    (StatusCode::ACCEPTED, Json(SignalAck { delivered }))
}
