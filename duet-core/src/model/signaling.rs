use crate::model::ClientId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Frames a client sends to the signaling server.
///
/// `join_waiting_pool` and `hangup` may arrive without `d` (or with
/// `"d": null`); both decode as the variant with no optional fields set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "snake_case",
    rename_all_fields = "camelCase",
    from = "ClientFrame"
)]
pub enum ClientEvent {
    JoinWaitingPool {
        /// Opaque to the matchmaker.
        #[serde(default)]
        preferences: Option<Value>,
    },
    Signal {
        partner_id: ClientId,
        signal_data: Value,
    },
    Hangup {
        #[serde(default)]
        partner_id: Option<ClientId>,
    },
}

/// Incoming shape of `ClientEvent` with optional content.
#[derive(Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
enum ClientFrame {
    JoinWaitingPool(Option<JoinContent>),
    Signal {
        partner_id: ClientId,
        signal_data: Value,
    },
    Hangup(Option<HangupContent>),
}

#[derive(Deserialize, Default)]
struct JoinContent {
    #[serde(default)]
    preferences: Option<Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct HangupContent {
    #[serde(default)]
    partner_id: Option<ClientId>,
}

impl From<ClientFrame> for ClientEvent {
    fn from(frame: ClientFrame) -> Self {
        match frame {
            ClientFrame::JoinWaitingPool(content) => ClientEvent::JoinWaitingPool {
                preferences: content.unwrap_or_default().preferences,
            },
            ClientFrame::Signal {
                partner_id,
                signal_data,
            } => ClientEvent::Signal {
                partner_id,
                signal_data,
            },
            ClientFrame::Hangup(content) => ClientEvent::Hangup {
                partner_id: content.unwrap_or_default().partner_id,
            },
        }
    }
}

/// Frames the signaling server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Welcome { client_id: ClientId },
    Matched { partner_id: ClientId },
    Signal { signal_data: Value },
    UserLeft,
}
