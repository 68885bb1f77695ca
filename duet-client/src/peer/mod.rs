mod rtc_peer;

pub use rtc_peer::{RtcConnector, RtcPeer};

use crate::media::LocalMedia;
use anyhow::Result;
use async_trait::async_trait;
use duet_core::{IceCandidate, SessionDescription};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceState {
    pub fn is_established(self) -> bool {
        matches!(self, IceState::Connected | IceState::Completed)
    }

    pub fn is_lost(self) -> bool {
        matches!(
            self,
            IceState::Disconnected | IceState::Failed | IceState::Closed
        )
    }
}

/// Audio arriving from the partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub stream_id: String,
    pub track_id: String,
    pub codec: String,
}

/// Everything a transport reports back on its own initiative.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    LocalCandidate(IceCandidate),
    IceStateChanged(IceState),
    RemoteTrack(RemoteStream),
    DataChannelOpen,
    DataChannelMessage(String),
    DataChannelClosed,
}

/// Where a transport delivers its `PeerEvent`s.
///
/// The negotiator hands each transport a sink bound to one session, so
/// events from an abandoned transport can be recognized and ignored.
#[derive(Clone)]
pub struct PeerEventSink {
    emit: Arc<dyn Fn(PeerEvent) + Send + Sync>,
}

impl PeerEventSink {
    pub fn new(emit: impl Fn(PeerEvent) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    pub fn emit(&self, event: PeerEvent) {
        (self.emit)(event)
    }
}

impl fmt::Debug for PeerEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PeerEventSink")
    }
}

/// One peer connection.
///
/// Mirrors the subset of the browser `RTCPeerConnection` surface a 1:1 call
/// needs. Methods are called from spawned tasks, never concurrently for the
/// same description step.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_local_audio(&self, media: &LocalMedia) -> Result<()>;

    /// Only the caller opens the channel; the callee learns about it
    /// through `PeerEvent::DataChannelOpen`.
    async fn create_data_channel(&self, label: &str) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn send_text(&self, text: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds a fresh transport for every session.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, events: PeerEventSink) -> Result<Arc<dyn PeerTransport>>;
}
