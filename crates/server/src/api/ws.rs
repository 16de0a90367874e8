//! WebSocket support for live item updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use reelpilot_core::{ItemEvent, ProductionReport, PublishReport, Session, SessionEvent};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// An item changed state.
    ItemUpdate { event: ItemEvent },
    /// Every pipeline of a production batch has settled.
    ProductionFinished { report: ProductionReport },
    /// A publish batch has finished.
    PublishFinished { report: PublishReport },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::ItemUpdate { .. } => "item_update",
            WsMessage::ProductionFinished { .. } => "production_finished",
            WsMessage::PublishFinished { .. } => "publish_finished",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

impl From<SessionEvent> for WsMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::ProductionFinished { report } => WsMessage::ProductionFinished { report },
            SessionEvent::PublishFinished { report } => WsMessage::PublishFinished { report },
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // No listeners is fine.
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    /// Relay item and batch events from `session` until its channels close.
    pub fn forward(&self, session: &Session) -> JoinHandle<()> {
        let mut items = session.board().subscribe();
        let mut batches = session.subscribe();
        let broadcaster = self.clone();

        tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                tokio::select! {
                    result = items.recv() => match result {
                        Ok(event) => broadcaster.broadcast(WsMessage::ItemUpdate { event }),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Item event relay lagged, skipped {} events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    result = batches.recv() => match result {
                        Ok(event) => broadcaster.broadcast(event.into()),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Session event relay lagged, skipped {} events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = heartbeat.tick() => {
                        broadcaster.broadcast(WsMessage::Heartbeat {
                            timestamp: chrono::Utc::now().timestamp(),
                        });
                    }
                }
            }
            debug!("Event relay stopped");
        })
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
    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();
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
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Clients only ever close; anything else is logged and ignored.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => debug!("Received text message: {}", text),
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
