mod chat;
mod client_id;
mod payload;
mod role;
mod signaling;

pub use chat::{ChatMessage, MessageOrigin};
pub use client_id::ClientId;
pub use payload::{IceCandidate, SdpKind, SessionDescription, SignalPayload};
pub use role::Role;
pub use signaling::{ClientEvent, IceServerConfig, ServerEvent};
