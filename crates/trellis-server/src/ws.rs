//! Websocket sessions
//!
//! Each socket registers with the hub and gets a task draining its outbound
//! channel into the sink. Inbound text frames go through [`Hub::dispatch`];
//! the receive loop awaits each dispatch before reading the next frame, so
//! one client's requests are handled strictly in arrival order.
//!
//! [`Hub::dispatch`]: crate::hub::Hub::dispatch

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn = state.hub.register(tx);
    log::info!("client {} connected", conn);

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => state.hub.dispatch(conn, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                log::debug!("client {} socket error: {}", conn, err);
                break;
            }
        }
    }

    state.hub.unregister(conn);
    send_task.abort();
    log::info!("client {} disconnected", conn);
}
