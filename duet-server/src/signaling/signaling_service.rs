use crate::signaling::{ConnectionRegistry, SignalingOutput};
use async_trait::async_trait;
use axum::extract::ws::Message;
use duet_core::{ClientId, ServerEvent};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

#[derive(Clone, Default)]
pub struct SignalingService {
    registry: Arc<ConnectionRegistry>,
}

impl SignalingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client_id: ClientId, tx: mpsc::UnboundedSender<Message>) -> bool {
        self.registry.register(client_id, tx)
    }

    pub fn unregister(&self, client_id: &ClientId) {
        self.registry.unregister(client_id);
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Best effort: events for a connection that is already gone are dropped.
    pub fn send_event(&self, client_id: &ClientId, event: &ServerEvent) {
        let Some(peer) = self.registry.sender(client_id) else {
            warn!("Attempted to send {:?} to disconnected client {}", event, client_id);
            return;
        };

        match serde_json::to_string(event) {
            Ok(json) => {
                if let Err(e) = peer.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", client_id, e);
                }
            }
            Err(e) => error!("Failed to serialize server event: {}", e),
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_matched(&self, client_id: ClientId, partner_id: ClientId) {
        self.send_event(&client_id, &ServerEvent::Matched { partner_id });
    }

    async fn send_signal(&self, client_id: ClientId, signal_data: Value) {
        self.send_event(&client_id, &ServerEvent::Signal { signal_data });
    }

    async fn send_user_left(&self, client_id: ClientId) {
        self.send_event(&client_id, &ServerEvent::UserLeft);
    }
}
