use crate::negotiation::NegotiationState;
use thiserror::Error;

/// Failure to obtain the microphone. Messages are shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("Microphone access was denied. Please grant permission and try again.")]
    PermissionDenied,

    #[error(
        "Could not access your microphone. Please ensure it is connected and not in use by another application."
    )]
    DeviceUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: NegotiationState,
        to: NegotiationState,
    },

    #[error("peer connection setup failed: {0}")]
    Transport(String),

    #[error("session description exchange failed: {0}")]
    Sdp(String),

    #[error("negotiation timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session task has stopped")]
    Closed,
}
