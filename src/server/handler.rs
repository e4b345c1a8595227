//! WebSocket Handlers
//!
//! Upgrade requests for the chat hub and the echo relay, and the lifecycle
//! of each accepted socket.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::hub::{BroadcastHub, ConnectionId, HubError};
use super::relay::EchoRelay;
use super::state::AppState;
use crate::message::Message;

/// Query parameters accepted on connect
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Accepted for compatibility; not validated
    pub token: Option<String>,
}

/// GET /ws/:client_id
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    tracing::debug!(
        client_id = %client_id,
        has_token = params.token.is_some(),
        "Chat upgrade requested"
    );
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_chat_socket(socket, hub, client_id))
}

/// GET /relay/:client_id
pub async fn relay_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    tracing::debug!(
        client_id = %client_id,
        has_token = params.token.is_some(),
        "Relay upgrade requested"
    );
    let relay = EchoRelay::new(state.relay.clone(), state.hub.config().bot_name.clone());
    ws.on_upgrade(move |socket| handle_relay_socket(socket, relay, client_id))
}

async fn handle_chat_socket(socket: WebSocket, hub: Arc<BroadcastHub>, client_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let connection_id = match hub.on_connect(&client_id, tx).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(client_id = %client_id, error = %e, "Rejecting chat connection");
            let notice = Message::system(e.to_string());
            let _ = sender.send(WsMessage::Text(notice.to_json())).await;
            let _ = sender
                .send(WsMessage::Close(Some(CloseFrame {
                    code: close_code::AGAIN,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };

    let mut send_task = tokio::spawn(forward_outgoing(sender, rx));

    let hub_for_recv = Arc::clone(&hub);
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_chat_frame(&hub_for_recv, connection_id, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(connection_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.on_disconnect(connection_id).await;
}

/// Route one frame through the hub
///
/// Returns false if the connection should be closed.
async fn handle_chat_frame(hub: &BroadcastHub, connection_id: ConnectionId, frame: WsMessage) -> bool {
    let payload = match frame {
        WsMessage::Text(text) => text.into_bytes(),
        WsMessage::Binary(bytes) => bytes,
        WsMessage::Ping(_) | WsMessage::Pong(_) => return true,
        WsMessage::Close(_) => {
            tracing::debug!(connection_id, "Client requested close");
            return false;
        }
    };

    match hub.on_message(connection_id, &payload).await {
        Ok(_) => true,
        Err(HubError::Parse(e)) => {
            tracing::debug!(connection_id, error = %e, "Dropping malformed message");
            true
        }
        Err(e) => {
            tracing::warn!(connection_id, error = %e, "Failed to route message");
            false
        }
    }
}

async fn handle_relay_socket(socket: WebSocket, relay: EchoRelay, client_id: String) {
    let (sender, mut receiver) = socket.split();

    let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Message>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Message>();

    tracing::info!(client_id = %client_id, "Relay connected");

    let mut send_task = tokio::spawn(forward_outgoing(sender, out_rx));
    let consumer = tokio::spawn(relay.run(queue_rx, out_tx));

    let relay_client = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            let payload = match frame {
                WsMessage::Text(text) => text.into_bytes(),
                WsMessage::Binary(bytes) => bytes,
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                WsMessage::Close(_) => break,
            };
            match Message::decode(&payload) {
                Ok(message) => {
                    if queue_tx.send(message).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(client_id = %relay_client, error = %e, "Dropping malformed message");
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }
    consumer.abort();

    tracing::info!(client_id = %client_id, "Relay disconnected");
}

async fn forward_outgoing(
    mut sender: SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if sender.send(WsMessage::Text(msg.to_json())).await.is_err() {
            tracing::debug!("WebSocket send failed, closing connection");
            break;
        }
    }
}
