use duet_core::ClientId;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

/// Commands the WebSocket handlers feed into the lobby event loop.
#[derive(Debug)]
pub enum LobbyCommand {
    /// `join_waiting_pool`.
    Join { client_id: ClientId },

    /// `signal`: relay an opaque payload to the sender's partner.
    Signal {
        from: ClientId,
        target: ClientId,
        signal_data: Value,
    },

    /// `hangup`.
    Hangup { client_id: ClientId },

    /// The socket is gone. Sent exactly once per connection.
    Disconnect { client_id: ClientId },

    Inspect { reply: oneshot::Sender<LobbySnapshot> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LobbySnapshot {
    pub waiting: Vec<ClientId>,
    pub pairs: Vec<(ClientId, ClientId)>,
}
