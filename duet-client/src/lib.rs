mod config;
mod error;
pub mod media;
pub mod negotiation;
pub mod peer;
pub mod session;
pub mod signaling;

pub use config::ClientConfig;
pub use error::{MediaError, NegotiationError, SessionError};
pub use negotiation::NegotiationState;
pub use session::{AppState, Session, SessionEvent, SessionHandle, SessionSnapshot};
pub use signaling::{SignalingLink, connect_signaling};
