mod ws_connector;

pub use ws_connector::connect_signaling;

use duet_core::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;

/// Both directions of a signaling connection as plain channels.
///
/// The session never touches the socket; anything that can move
/// `ClientEvent`s out and `ServerEvent`s in can back it.
#[derive(Debug)]
pub struct SignalingLink {
    pub outgoing: mpsc::UnboundedSender<ClientEvent>,
    pub incoming: mpsc::UnboundedReceiver<ServerEvent>,
}

impl SignalingLink {
    pub fn new(
        outgoing: mpsc::UnboundedSender<ClientEvent>,
        incoming: mpsc::UnboundedReceiver<ServerEvent>,
    ) -> Self {
        Self { outgoing, incoming }
    }
}
