use async_trait::async_trait;
use duet_core::ClientId;
use serde_json::Value;

/// Outbound half of the signaling protocol, implemented by the WebSocket
/// layer so the lobby can reach clients without knowing about sockets.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// `matched` carrying the partner's id.
    async fn send_matched(&self, client_id: ClientId, partner_id: ClientId);

    /// `signal` with the payload exactly as the partner sent it.
    async fn send_signal(&self, client_id: ClientId, signal_data: Value);

    /// `user_left`.
    async fn send_user_left(&self, client_id: ClientId);
}
