//! `GET /api/v1/ws?client_id=<id>&api_key=<optional>` (§6): upgrades to a
//! persistent notification stream. Grounded on the node WebSocket gateway
//! in `sblanchard-SerialAgent`'s `crates/gateway/src/nodes/ws.rs`: one
//! outbound `mpsc` channel per connection, a writer task forwarding it to
//! the socket, and a reader loop watching for pong/close.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use hive_core::auth::ApiKeyStore;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::hub::PushHub;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const SESSION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub client_id: String,
    pub api_key: Option<String>,
}

pub struct PushGatewayState {
    pub hub: Arc<PushHub>,
    pub keys: Arc<dyn ApiKeyStore>,
}

pub async fn push_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<PushGatewayState>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    if let Some(key) = query.api_key.as_deref() {
        match hive_core::auth::authenticate(state.keys.as_ref(), Some(key)) {
            Ok(_) => {}
            Err(_) => {
                return (axum::http::StatusCode::UNAUTHORIZED, "invalid or inactive API key")
                    .into_response();
            }
        }
    }

    let client_id = query.client_id;
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: Arc<PushGatewayState>, client_id: String) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(64);

    state.hub.register(&client_id, outbound_tx).await;
    tracing::info!(client_id = %client_id, "push session registered");

    let writer_client_id = client_id.clone();
    let writer = tokio::spawn(async move {
        let mut keepalive = interval(KEEPALIVE_INTERVAL);
        loop {
            tokio::select! {
                notification = outbound_rx.recv() => {
                    let Some(notification) = notification else { break };
                    let Ok(json) = serde_json::to_string(&notification) else { continue };
                    if sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                _ = keepalive.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(client_id = %writer_client_id, "push writer task exiting");
    });

    loop {
        let next = tokio::time::timeout(SESSION_TIMEOUT, stream.next()).await;
        match next {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Err(_) => break,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) => break,
        }
    }

    writer.abort();
    state.hub.unregister(&client_id);
    tracing::info!(client_id = %client_id, "push session closed");
}
