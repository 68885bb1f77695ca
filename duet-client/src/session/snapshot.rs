use crate::negotiation::{CloseReason, NegotiationState};
use crate::peer::RemoteStream;
use duet_core::{ChatMessage, ClientId, Role};
use serde::Serialize;

/// Coarse state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Idle,
    Searching,
    Connecting,
    Connected,
    Disconnected,
}

impl From<NegotiationState> for AppState {
    fn from(state: NegotiationState) -> Self {
        match state {
            NegotiationState::Idle | NegotiationState::Failed => AppState::Idle,
            NegotiationState::AwaitingMatch => AppState::Searching,
            NegotiationState::Negotiating => AppState::Connecting,
            NegotiationState::Connected => AppState::Connected,
            NegotiationState::Closed => AppState::Disconnected,
        }
    }
}

/// Everything a UI needs to render the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub client_id: Option<ClientId>,
    pub state: NegotiationState,
    pub app_state: AppState,
    pub partner_id: Option<ClientId>,
    pub role: Option<Role>,
    pub remote_stream: Option<RemoteStream>,
    pub chat_ready: bool,
    pub muted: bool,
    pub last_media_error: Option<String>,
    pub last_error: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            client_id: None,
            state: NegotiationState::Idle,
            app_state: AppState::Idle,
            partner_id: None,
            role: None,
            remote_stream: None,
            chat_ready: false,
            muted: false,
            last_media_error: None,
            last_error: None,
            messages: Vec::new(),
        }
    }
}

/// Notifications broadcast to subscribers, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Matched { partner_id: ClientId },
    StateChanged {
        from: NegotiationState,
        to: NegotiationState,
    },
    RemoteStreamReady(RemoteStream),
    ChatReady,
    Chat(ChatMessage),
    MediaError(String),
    Failure(String),
    Closed(CloseReason),
}
