//! Integration tests for duet-server.
//!
//! - `matchmaking_tests` - pool, pairing and cleanup through the lobby loop
//! - `relay_tests` - signal routing between partners
//! - `websocket_tests` - the full JSON protocol over a real socket

pub mod websocket_tests;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

use duet_core::{ClientId, ServerEvent};
use duet_server::{Lobby, LobbyHandle};

use crate::utils::{Delivered, MockSignalingOutput};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Spawns a lobby wired to a mock signaling output.
pub fn create_test_lobby() -> (
    LobbyHandle,
    mpsc::UnboundedReceiver<Delivered>,
    MockSignalingOutput,
) {
    let (signaling, delivered_rx) = MockSignalingOutput::new();
    let lobby = Lobby::spawn(Arc::new(signaling.clone()));

    (lobby, delivered_rx, signaling)
}

/// Waits for the next delivery, failing after a short timeout.
pub async fn next_delivery(rx: &mut mpsc::UnboundedReceiver<Delivered>) -> Delivered {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timeout waiting for delivery")
        .expect("signaling channel closed")
}

pub fn matched(to: &str, partner: &str) -> Delivered {
    Delivered {
        to: ClientId::from(to),
        event: ServerEvent::Matched {
            partner_id: ClientId::from(partner),
        },
    }
}
