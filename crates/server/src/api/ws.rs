//! WebSocket support for real-time dashboard updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use subscout_core::{Job, JobStatus, SearchOutcome, Settings};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Interval between heartbeats on an idle connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A background job changed status.
    JobUpdate {
        job_id: String,
        job_type: String,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        details: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        error: String,
    },
    /// Stored candidates for a media item were replaced by a search.
    CandidatesUpdated {
        media_id: i64,
        count: usize,
        /// Providers that failed during the search.
        failed_providers: Vec<String>,
    },
    /// Operator settings changed.
    SettingsUpdated { settings: Settings },
    /// A provider credential was saved.
    CredentialSaved { provider: String },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn type_name(&self) -> &'static str {
        match self {
            WsMessage::JobUpdate { .. } => "job_update",
            WsMessage::CandidatesUpdated { .. } => "candidates_updated",
            WsMessage::SettingsUpdated { .. } => "settings_updated",
            WsMessage::CredentialSaved { .. } => "credential_saved",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn job_updated(&self, job: &Job) {
        self.broadcast(WsMessage::JobUpdate {
            job_id: job.id.clone(),
            job_type: job.job_type.clone(),
            status: job.status,
            details: job.details.clone(),
            error: job.error.clone(),
        });
    }

    pub fn candidates_updated(&self, outcome: &SearchOutcome) {
        self.broadcast(WsMessage::CandidatesUpdated {
            media_id: outcome.media_id,
            count: outcome.candidates.len(),
            failed_providers: outcome.errors.keys().cloned().collect(),
        });
    }

    pub fn settings_updated(&self, settings: &Settings) {
        self.broadcast(WsMessage::SettingsUpdated {
            settings: settings.clone(),
        });
    }

    pub fn credential_saved(&self, provider: &str) {
        self.broadcast(WsMessage::CredentialSaved {
            provider: provider.to_string(),
        });
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
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

    // Subscribe to broadcast messages
    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    // Forward broadcast messages (and heartbeats) to this client
    let send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        // The first tick completes immediately.
        heartbeat.tick().await;

        loop {
            let msg = tokio::select! {
                result = rx.recv() => match result {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, skipped {} messages", n);
                        WS_LAG_EVENTS.inc();
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                },
                _ = heartbeat.tick() => WsMessage::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp(),
                },
            };

            WS_MESSAGES_SENT.with_label_values(&[msg.type_name()]).inc();

            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize WsMessage: {}", e);
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Received text message: {}", text);
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_message_tags() {
        let msg = WsMessage::CredentialSaved {
            provider: "assrt".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "credential_saved");
        assert_eq!(json["provider"], "assrt");

        let json = serde_json::to_value(WsMessage::Heartbeat { timestamp: 1 }).unwrap();
        assert_eq!(json["type"], "heartbeat");
    }

    #[tokio::test]
    async fn test_broadcast_candidates_updated() {
        let broadcaster = WsBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        let mut errors = BTreeMap::new();
        errors.insert("opensubtitles".to_string(), "timed out after 25s".to_string());
        broadcaster.candidates_updated(&SearchOutcome {
            media_id: 3,
            candidates: Vec::new(),
            errors,
            providers_run: vec!["assrt".to_string(), "opensubtitles".to_string()],
        });

        let msg = rx.recv().await.unwrap();
        assert_eq!(
            msg,
            WsMessage::CandidatesUpdated {
                media_id: 3,
                count: 0,
                failed_providers: vec!["opensubtitles".to_string()],
            }
        );
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let broadcaster = WsBroadcaster::default();
        broadcaster.credential_saved("assrt");
    }
}
