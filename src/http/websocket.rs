//! WebSocket notification relay.
//!
//! # Data Flow
//! ```text
//! NotificationHub ──broadcast──→ relay task ──JSON text frames──→ Client
//! ```
//!
//! # Design Decisions
//! - The subscription is taken before the upgrade so nothing published
//!   after the handshake is missed
//! - Client frames are read only to notice Close; their content is ignored

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::http::server::AppState;
use crate::notifications::Notification;
use crate::observability::metrics;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

pub async fn notifications_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> impl IntoResponse {
    let rx = state.hub.subscribe();
    tracing::info!(
        user_id = ?query.user_id,
        subscribers = state.hub.subscriber_count(),
        "Notification socket upgrade accepted"
    );
    ws.on_upgrade(move |socket| relay(socket, rx, query.user_id))
}

async fn relay(socket: WebSocket, mut rx: broadcast::Receiver<Notification>, user_id: Option<String>) {
    metrics::ws_client_connected();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(notification) => {
                    if !notification.is_for(user_id.as_deref()) {
                        continue;
                    }
                    let text = match serde_json::to_string(&notification) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode notification");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = ?user_id, skipped, "Notification socket lagging; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sink.close().await;
    metrics::ws_client_disconnected();
    tracing::debug!(user_id = ?user_id, "Notification socket closed");
}
