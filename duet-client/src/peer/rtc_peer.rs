use crate::media::{FRAME_DURATION, LocalMedia};
use crate::peer::{IceState, PeerConnector, PeerEvent, PeerEventSink, PeerTransport, RemoteStream};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use duet_core::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

type ChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

/// Opens real peer connections through webrtc-rs.
#[derive(Debug, Clone)]
pub struct RtcConnector {
    ice_servers: Vec<IceServerConfig>,
}

impl RtcConnector {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }
}

#[async_trait]
impl PeerConnector for RtcConnector {
    async fn connect(&self, events: PeerEventSink) -> Result<Arc<dyn PeerTransport>> {
        let peer = RtcPeer::new(&self.ice_servers, events).await?;
        Ok(Arc::new(peer))
    }
}

pub struct RtcPeer {
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: ChannelSlot,
    events: PeerEventSink,
    pumps: Mutex<Vec<JoinHandle<()>>>,
}

impl RtcPeer {
    pub async fn new(ice_servers: &[IceServerConfig], events: PeerEventSink) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );
        let data_channel: ChannelSlot = Arc::new(Mutex::new(None));

        let state_events = events.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!("ICE connection state changed: {:?}", s);
                    if let Some(state) = map_ice_state(s) {
                        events.emit(PeerEvent::IceStateChanged(state));
                    }
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events.emit(PeerEvent::LocalCandidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                }));
            })
        }));

        let track_events = events.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    let remote = RemoteStream {
                        stream_id: track.stream_id(),
                        track_id: track.id(),
                        codec: track.codec().capability.mime_type,
                    };
                    info!("Remote track {} on stream {}", remote.track_id, remote.stream_id);
                    events.emit(PeerEvent::RemoteTrack(remote));

                    // Keeps the receiver flowing; playback is up to the host.
                    tokio::spawn(async move { while track.read_rtp().await.is_ok() {} });
                })
            },
        ));

        let dc_events = events.clone();
        let dc_slot = Arc::clone(&data_channel);
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let events = dc_events.clone();
            let slot = Arc::clone(&dc_slot);
            Box::pin(async move {
                debug!("Remote opened DataChannel '{}'", dc.label());
                wire_data_channel(&dc, &events);
                *slot.lock().await = Some(dc);
            })
        }));

        Ok(Self {
            peer_connection,
            data_channel,
            events,
            pumps: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PeerTransport for RtcPeer {
    async fn add_local_audio(&self, media: &LocalMedia) -> Result<()> {
        let mut pumps = self.pumps.lock().await;

        for local in media.tracks() {
            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                local.id().to_owned(),
                "duet".to_owned(),
            ));

            let rtp_sender = self
                .peer_connection
                .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .context("Failed to add audio track")?;

            pumps.push(tokio::spawn(async move {
                let mut rtcp_buf = vec![0u8; 1500];
                while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
            }));

            let local = local.clone();
            pumps.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(FRAME_DURATION);
                while local.is_live() {
                    ticker.tick().await;
                    let sample = Sample {
                        data: local.next_frame(),
                        duration: FRAME_DURATION,
                        ..Default::default()
                    };
                    if let Err(e) = track.write_sample(&sample).await {
                        warn!("Audio pump for {} stopped: {}", local.id(), e);
                        break;
                    }
                }
            }));
        }

        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .context("Failed to create data channel")?;

        wire_data_channel(&dc, &self.events);
        *self.data_channel.lock().await = Some(dc);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(description)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(description)?)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        let dc = self
            .data_channel
            .lock()
            .await
            .clone()
            .context("Data channel not available")?;

        if dc.ready_state() != RTCDataChannelState::Open {
            bail!("Data channel is {:?}", dc.ready_state());
        }

        dc.send_text(text.to_owned())
            .await
            .context("Failed to send message")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for pump in self.pumps.lock().await.drain(..) {
            pump.abort();
        }
        if let Some(dc) = self.data_channel.lock().await.take() {
            if let Err(e) = dc.close().await {
                debug!("Closing data channel: {}", e);
            }
        }
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}

fn wire_data_channel(dc: &Arc<RTCDataChannel>, events: &PeerEventSink) {
    let open_events = events.clone();
    let label = dc.label().to_owned();
    dc.on_open(Box::new(move || {
        let events = open_events.clone();
        Box::pin(async move {
            info!("DataChannel '{}' open", label);
            events.emit(PeerEvent::DataChannelOpen);
        })
    }));

    let msg_events = events.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let events = msg_events.clone();
        Box::pin(async move {
            if !msg.is_string {
                debug!("Ignoring {} byte binary message", msg.data.len());
                return;
            }
            match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => events.emit(PeerEvent::DataChannelMessage(text)),
                Err(e) => warn!("Dropping non UTF-8 chat message: {}", e),
            }
        })
    }));

    let close_events = events.clone();
    dc.on_close(Box::new(move || {
        let events = close_events.clone();
        Box::pin(async move {
            events.emit(PeerEvent::DataChannelClosed);
        })
    }));
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    let desc = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp)?,
    };
    Ok(desc)
}

fn map_ice_state(s: RTCIceConnectionState) -> Option<IceState> {
    let state = match s {
        RTCIceConnectionState::New => IceState::New,
        RTCIceConnectionState::Checking => IceState::Checking,
        RTCIceConnectionState::Connected => IceState::Connected,
        RTCIceConnectionState::Completed => IceState::Completed,
        RTCIceConnectionState::Disconnected => IceState::Disconnected,
        RTCIceConnectionState::Failed => IceState::Failed,
        RTCIceConnectionState::Closed => IceState::Closed,
        _ => return None,
    };
    Some(state)
}
