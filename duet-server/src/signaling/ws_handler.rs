use crate::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use duet_core::{ClientEvent, ClientId, ServerEvent};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());

    if !state.allowed_origins.allows(origin) {
        warn!("Rejecting WebSocket upgrade from origin {:?}", origin);
        return StatusCode::FORBIDDEN.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let client_id = ClientId::generate();
    info!("New WebSocket connection: {}", client_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    if !state.signaling.register(client_id.clone(), tx) {
        error!("Client id {} already registered, dropping connection", client_id);
        return;
    }
    state.signaling.send_event(
        &client_id,
        &ServerEvent::Welcome {
            client_id: client_id.clone(),
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();
        let client_id = client_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
                            Ok(event) => event,
                            Err(e) => {
                                warn!("Invalid ClientEvent from {}: {}", client_id, e);
                                continue;
                            }
                        };

                        let sent = match event {
                            ClientEvent::JoinWaitingPool { .. } => {
                                state.lobby.join(client_id.clone()).await
                            }
                            ClientEvent::Signal {
                                partner_id,
                                signal_data,
                            } => {
                                state
                                    .lobby
                                    .signal(client_id.clone(), partner_id, signal_data)
                                    .await
                            }
                            ClientEvent::Hangup { .. } => {
                                state.lobby.hangup(client_id.clone()).await
                            }
                        };

                        if let Err(e) = sent {
                            error!("Lobby died: {}", e);
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Runs once per connection whichever pump finished first.
    if let Err(e) = state.lobby.disconnect(client_id.clone()).await {
        error!("Failed to clean up {}: {}", client_id, e);
    }
    state.signaling.unregister(&client_id);
    info!("WebSocket disconnected: {}", client_id);
}
