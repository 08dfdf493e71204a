//! WebSocket broadcast of bus events to dashboard clients. Subscribes once to
//! the `EventBus` at startup and relays every emit as JSON to all connected
//! sockets; slow or absent subscribers never block event delivery (the bus
//! contract itself is best-effort, see C1).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast;

use super::AppState;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state.events_tx.subscribe()))
}

async fn handle_socket(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    while let Ok(message) = rx.recv().await {
        if socket.send(Message::Text(message)).await.is_err() {
            break;
        }
    }
}
