//! Price streaming over websocket.
//!
//! Each connection registers with the hub and starts with no
//! subscriptions; clients send `{"action":"subscribe","symbol":"..."}`
//! to opt into symbols. Ticks flow out through a spawned forward task
//! so a slow reader never blocks inbound handling.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use gateway_core::ClientMessage;
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn prices_ws(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Tokens are accepted but never verified here; auth lives in front
    // of the gateway.
    info!(
        "ws client connecting with token={:?}",
        query.token.as_deref().unwrap_or("")
    );
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut ticks) = state.hub.register();
    let (mut sink, mut stream) = socket.split();

    let forward = tokio::spawn(async move {
        while let Some(tick) = ticks.recv().await {
            let payload = json!({ "type": "price", "data": tick });
            if sink.send(Message::Text(payload.to_string())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(cmd) => state.hub.apply(id, &cmd),
                Err(err) => debug!("ws {id}: ignoring unparseable message: {err}"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.hub.unregister(id);
    forward.abort();
    info!("ws {id} disconnected");
}
