//! WebSocket stream of orchestrator events for the UI.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use questline_core::OrchestratorEvent;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Keep-alive period for idle connections.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WsMessage {
    /// An orchestrator change notification, serialized with its own `type` tag.
    Event(OrchestratorEvent),
    /// Server heartbeat.
    Heartbeat(Heartbeat),
}

#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub timestamp: i64,
}

impl WsMessage {
    pub fn heartbeat() -> Self {
        WsMessage::Heartbeat(Heartbeat {
            kind: "heartbeat",
            timestamp: Utc::now().timestamp(),
        })
    }

    /// Label used for the messages-sent metric.
    pub fn type_name(&self) -> &'static str {
        match self {
            WsMessage::Event(OrchestratorEvent::SessionStarted { .. }) => "session_started",
            WsMessage::Event(OrchestratorEvent::SessionProgress { .. }) => "session_progress",
            WsMessage::Event(OrchestratorEvent::SessionStopped { .. }) => "session_stopped",
            WsMessage::Event(OrchestratorEvent::QueueChanged { .. }) => "queue_changed",
            WsMessage::Event(OrchestratorEvent::QuestsRefreshed { .. }) => "quests_refreshed",
            WsMessage::Heartbeat(_) => "heartbeat",
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.orchestrator().subscribe_events();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        // First tick completes immediately
        heartbeat.tick().await;

        loop {
            let msg = tokio::select! {
                result = rx.recv() => match result {
                    Ok(event) => WsMessage::Event(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, skipped {} events", n);
                        WS_LAG_EVENTS.inc();
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                },
                _ = heartbeat.tick() => WsMessage::heartbeat(),
            };

            WS_MESSAGES_SENT.with_label_values(&[msg.type_name()]).inc();
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize WsMessage: {}", e),
            }
        }
    });

    // Clients only send control frames
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => debug!("Ignoring client message: {}", text),
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
