//! WebSocket connection handlers.
//!
//! The socket lifecycle maps onto the hub's three entry points:
//! upgrade → `register`, text frame → `dispatch`, close → `unregister`.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::SplitSink, stream::StreamExt};

use crate::{
    domain::ConnectionId,
    infrastructure::connection::{OutboundReceiver, WebSocketConnection, outbound_channel},
    ui::state::AppState,
    usecase::ConnectionHub,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that receives messages from the rx channel and pushes them to the WebSocket sender.
///
/// This function handles the outbound message flow: events broadcast by the hub
/// (via rx channel) are written to this client's WebSocket connection.
fn pusher_loop(
    mut rx: OutboundReceiver,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Spawns a task that forwards inbound frames from this client to the hub.
fn receiver_loop(
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    hub: Arc<ConnectionHub>,
    id: ConnectionId,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on connection '{}': {}", id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => hub.dispatch(&id, text.as_str()).await,
                Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => hub.dispatch(&id, text).await,
                    Err(_) => {
                        tracing::debug!("Ignoring non UTF-8 binary frame from '{}'", id);
                    }
                },
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", id);
                    break;
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let id = state.hub.next_connection_id();
    let (tx, rx) = outbound_channel();
    let connection = Arc::new(WebSocketConnection::new(id.clone(), tx));

    // onConnect
    if let Err(e) = state.hub.register(connection.clone()).await {
        tracing::warn!("Rejecting connection: {}", e);
        return;
    }

    let (sender, receiver) = socket.split();
    let mut send_task = pusher_loop(rx, sender);
    // onMessage
    let mut recv_task = receiver_loop(receiver, state.hub.clone(), id.clone());

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // onDisconnect
    connection.close();
    state.hub.unregister(&id).await;
}
