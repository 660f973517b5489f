//! Bridge WebSocket endpoint
//!
//! One [`ActiveConnection`] per socket. Outbound messages go through the
//! connection's queue and a writer task; inbound text frames are handled one
//! at a time, in arrival order. When the socket ends, the connection runs its
//! lost-connection callbacks.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use grpc_bridge::{ActiveConnection, OutgoingMessage};
use tracing::{debug, info, trace, warn};

use crate::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (conn, mut rx) = ActiveConnection::channel();
    info!(connection = %conn.id(), "Bridge client connected");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if send_message(&mut sender, &msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                trace!(connection = %conn.id(), %text, "Received frame");
                if let Err(e) = state.bridge.handle_text(&conn, &text).await {
                    debug!(connection = %conn.id(), error = %e, "Frame rejected");
                }
            }
            Ok(Message::Close(_)) => {
                info!(connection = %conn.id(), "Bridge client disconnected");
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(connection = %conn.id(), error = %e, "WebSocket error");
                break;
            }
        }
    }

    conn.close();
    send_task.abort();
}

/// Serialize and send one outbound message
pub async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &OutgoingMessage,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    debug!("Sending: {}", json);
    sender
        .send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
