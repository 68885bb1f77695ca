use crate::config::ClientConfig;
use crate::error::{MediaError, NegotiationError};
use crate::media::{LocalMedia, MediaDevices};
use crate::negotiation::NegotiationState;
use crate::peer::{IceState, PeerConnector, PeerEvent, PeerEventSink, PeerTransport, RemoteStream};
use duet_core::utils::CHAT_CHANNEL_LABEL;
use duet_core::{ClientId, IceCandidate, Role, SessionDescription, SignalPayload};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why a live session ended in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    LocalHangup,
    PartnerLeft,
    PeerDisconnected,
}

/// Side effects requested by the negotiator, drained by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    JoinPool,
    /// Tell the server we are done with the current partner (or the pool).
    LeavePartner { partner_id: Option<ClientId> },
    Signal {
        partner_id: ClientId,
        payload: SignalPayload,
    },
    StateChanged {
        from: NegotiationState,
        to: NegotiationState,
    },
    RemoteStream(RemoteStream),
    ChannelOpen,
    ChatReceived(String),
    MediaError(MediaError),
    Failure(NegotiationError),
    SessionClosed(CloseReason),
}

/// Completion of an asynchronous step, tagged with the session it belongs to.
pub struct Internal {
    generation: u64,
    event: InternalEvent,
}

enum InternalEvent {
    Prepared(Result<Prepared, SetupFailure>),
    RemoteApplied(Result<Option<SessionDescription>, String>),
    Deadline,
    Peer(PeerEvent),
}

struct Prepared {
    transport: Arc<dyn PeerTransport>,
    media: LocalMedia,
    offer: Option<SessionDescription>,
}

enum SetupFailure {
    Media(MediaError),
    Negotiation(NegotiationError),
}

/// Media acquired while a session is still being set up.
///
/// Shared with the setup task so that ending the session stops the
/// microphone right away instead of when setup finishes.
#[derive(Default)]
struct MediaSlot {
    released: bool,
    media: Option<LocalMedia>,
}

type SharedMediaSlot = Arc<Mutex<MediaSlot>>;

fn lock_slot(slot: &SharedMediaSlot) -> MutexGuard<'_, MediaSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ActiveSession {
    generation: u64,
    partner_id: ClientId,
    role: Role,
    transport: Option<Arc<dyn PeerTransport>>,
    media: Option<LocalMedia>,
    media_slot: SharedMediaSlot,
    remote_applying: bool,
    remote_description_set: bool,
    early_signals: Vec<SignalPayload>,
    pending_candidates: Vec<IceCandidate>,
    /// Local candidates found before our offer or answer went out.
    local_candidates: Vec<IceCandidate>,
    description_sent: bool,
    channel_open: bool,
    remote_stream: Option<RemoteStream>,
    deadline: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn release(mut self) {
        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }
        if let Some(media) = self.media.take() {
            media.stop();
        }
        {
            let mut slot = lock_slot(&self.media_slot);
            slot.released = true;
            if let Some(media) = slot.media.take() {
                media.stop();
            }
        }
        if let Some(transport) = self.transport.take() {
            spawn_close(transport);
        }
    }
}

/// Client side negotiation state machine.
///
/// Every transition runs synchronously on the owner's task. Slow work
/// (media acquisition, SDP generation, description exchange) is spawned and
/// re-enters through `handle_internal`; results that belong to a session
/// which has already ended are released and dropped.
pub struct Negotiator {
    state: NegotiationState,
    session: Option<ActiveSession>,
    generation: u64,
    negotiation_timeout: Duration,
    connector: Arc<dyn PeerConnector>,
    media_devices: Arc<dyn MediaDevices>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    outbox: VecDeque<Output>,
}

impl Negotiator {
    pub fn new(
        config: &ClientConfig,
        connector: Arc<dyn PeerConnector>,
        media_devices: Arc<dyn MediaDevices>,
    ) -> (Self, mpsc::UnboundedReceiver<Internal>) {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let negotiator = Self {
            state: NegotiationState::Idle,
            session: None,
            generation: 0,
            negotiation_timeout: config.negotiation_timeout,
            connector,
            media_devices,
            internal_tx,
            outbox: VecDeque::new(),
        };
        (negotiator, internal_rx)
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn partner_id(&self) -> Option<&ClientId> {
        self.session.as_ref().map(|s| &s.partner_id)
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }

    pub fn remote_stream(&self) -> Option<&RemoteStream> {
        self.session.as_ref().and_then(|s| s.remote_stream.as_ref())
    }

    pub fn chat_ready(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.channel_open)
    }

    pub fn is_muted(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|s| s.media.as_ref())
            .is_some_and(LocalMedia::is_muted)
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Output> + '_ {
        self.outbox.drain(..)
    }

    pub fn start_search(&mut self) {
        match self.state {
            NegotiationState::AwaitingMatch => {
                debug!("Already searching");
                return;
            }
            NegotiationState::Negotiating | NegotiationState::Connected => self.hang_up(),
            NegotiationState::Failed => {
                let _ = self.transition(NegotiationState::Idle);
            }
            NegotiationState::Idle | NegotiationState::Closed => {}
        }

        if self.transition(NegotiationState::AwaitingMatch).is_ok() {
            self.outbox.push_back(Output::JoinPool);
        }
    }

    pub fn hang_up(&mut self) {
        match self.state {
            NegotiationState::AwaitingMatch => {
                info!("Search cancelled");
                self.outbox.push_back(Output::LeavePartner { partner_id: None });
                let _ = self.transition(NegotiationState::Idle);
            }
            NegotiationState::Negotiating | NegotiationState::Connected => {
                self.close_session(CloseReason::LocalHangup, true);
            }
            state => debug!("Nothing to hang up in {:?}", state),
        }
    }

    pub fn on_partner_left(&mut self) {
        if self.state.is_live() {
            self.close_session(CloseReason::PartnerLeft, false);
        } else {
            debug!("Ignoring user_left in {:?}", self.state);
        }
    }

    pub fn on_matched(&mut self, local_id: &ClientId, partner_id: ClientId) {
        if self.state != NegotiationState::AwaitingMatch {
            warn!("Ignoring match with {} in {:?}", partner_id, self.state);
            return;
        }

        let role = Role::resolve(local_id, &partner_id);
        info!("Matched with {} as {:?}", partner_id, role);

        self.generation += 1;
        let generation = self.generation;
        if self.transition(NegotiationState::Negotiating).is_err() {
            return;
        }

        let deadline = {
            let tx = self.internal_tx.clone();
            let timeout = self.negotiation_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                let _ = tx.send(Internal {
                    generation,
                    event: InternalEvent::Deadline,
                });
            })
        };

        let media_slot = SharedMediaSlot::default();
        self.session = Some(ActiveSession {
            generation,
            partner_id,
            role,
            transport: None,
            media: None,
            media_slot: Arc::clone(&media_slot),
            remote_applying: false,
            remote_description_set: false,
            early_signals: Vec::new(),
            pending_candidates: Vec::new(),
            local_candidates: Vec::new(),
            description_sent: false,
            channel_open: false,
            remote_stream: None,
            deadline: Some(deadline),
        });

        let sink = self.sink(generation);
        let connector = Arc::clone(&self.connector);
        let media_devices = Arc::clone(&self.media_devices);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = prepare(role, connector, media_devices, media_slot, sink).await;
            let _ = tx.send(Internal {
                generation,
                event: InternalEvent::Prepared(result),
            });
        });
    }

    pub fn on_signal(&mut self, payload: SignalPayload) {
        let state = self.state;
        let Some(session) = self.session.as_mut().filter(|_| state.is_live()) else {
            debug!("Dropping late {} in {:?}", payload.name(), state);
            return;
        };

        if session.transport.is_none() {
            debug!("Holding {} until the transport is ready", payload.name());
            session.early_signals.push(payload);
            return;
        }

        self.apply_signal(payload);
    }

    /// Sends over the chat channel; false when it is not open.
    pub async fn send_text(&self, text: &str) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        let Some(transport) = session.transport.as_ref().filter(|_| session.channel_open) else {
            debug!("Chat channel not open, dropping message");
            return false;
        };

        match transport.send_text(text).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send chat message: {:#}", e);
                false
            }
        }
    }

    /// Returns whether local audio is muted afterwards.
    pub fn toggle_mute(&mut self) -> bool {
        match self.session.as_ref().and_then(|s| s.media.as_ref()) {
            Some(media) => media.toggle_mute(),
            None => false,
        }
    }

    pub fn handle_internal(&mut self, internal: Internal) {
        let Internal { generation, event } = internal;
        let current = self
            .session
            .as_ref()
            .is_some_and(|s| s.generation == generation);

        if !current {
            if let InternalEvent::Prepared(Ok(prepared)) = event {
                debug!("Releasing resources prepared for an abandoned session");
                prepared.media.stop();
                spawn_close(prepared.transport);
            }
            return;
        }

        match event {
            InternalEvent::Prepared(result) => self.on_prepared(result),
            InternalEvent::RemoteApplied(result) => self.on_remote_applied(result),
            InternalEvent::Deadline => {
                if self.state == NegotiationState::Negotiating {
                    warn!("Negotiation timed out");
                    self.fail(NegotiationError::Timeout);
                }
            }
            InternalEvent::Peer(event) => self.on_peer_event(event),
        }
    }

    fn on_prepared(&mut self, result: Result<Prepared, SetupFailure>) {
        let prepared = match result {
            Ok(prepared) => prepared,
            Err(SetupFailure::Media(e)) => {
                self.fail_media(e);
                return;
            }
            Err(SetupFailure::Negotiation(e)) => {
                self.fail(e);
                return;
            }
        };

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.transport = Some(prepared.transport);
        session.media = Some(prepared.media);
        let early = std::mem::take(&mut session.early_signals);

        if let Some(offer) = prepared.offer {
            self.send_description(SignalPayload::Offer(offer));
        }
        for payload in early {
            self.apply_signal(payload);
        }
    }

    fn apply_signal(&mut self, payload: SignalPayload) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(transport) = session.transport.clone() else {
            return;
        };

        match payload {
            SignalPayload::Offer(offer) => {
                if session.role.is_caller() {
                    warn!("Caller received an offer, ignoring it");
                    return;
                }
                if session.remote_applying || session.remote_description_set {
                    warn!("Ignoring repeated offer");
                    return;
                }
                session.remote_applying = true;
                self.spawn_step(async move {
                    transport.set_remote_description(offer).await?;
                    let answer = transport.create_answer().await?;
                    transport.set_local_description(answer.clone()).await?;
                    Ok(Some(answer))
                });
            }
            SignalPayload::Answer(answer) => {
                if !session.role.is_caller() {
                    warn!("Callee received an answer, ignoring it");
                    return;
                }
                if session.remote_applying || session.remote_description_set {
                    warn!("Ignoring repeated answer");
                    return;
                }
                session.remote_applying = true;
                self.spawn_step(async move {
                    transport.set_remote_description(answer).await?;
                    Ok(None)
                });
            }
            SignalPayload::Candidate(candidate) => {
                if session.remote_description_set {
                    spawn_candidates(transport, vec![candidate]);
                } else {
                    debug!("Queueing candidate until the remote description is set");
                    session.pending_candidates.push(candidate);
                }
            }
        }
    }

    fn spawn_step<F>(&self, step: F)
    where
        F: Future<Output = anyhow::Result<Option<SessionDescription>>> + Send + 'static,
    {
        let Some(generation) = self.session.as_ref().map(|s| s.generation) else {
            return;
        };
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = step.await.map_err(|e| format!("{e:#}"));
            let _ = tx.send(Internal {
                generation,
                event: InternalEvent::RemoteApplied(result),
            });
        });
    }

    fn on_remote_applied(&mut self, result: Result<Option<SessionDescription>, String>) {
        let answer = match result {
            Ok(answer) => answer,
            Err(e) => {
                self.fail(NegotiationError::Sdp(e));
                return;
            }
        };

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.remote_applying = false;
        session.remote_description_set = true;
        let queued = std::mem::take(&mut session.pending_candidates);
        let transport = session.transport.clone();

        if let Some(answer) = answer {
            self.send_description(SignalPayload::Answer(answer));
        }
        if let (false, Some(transport)) = (queued.is_empty(), transport) {
            debug!("Applying {} queued candidates", queued.len());
            spawn_candidates(transport, queued);
        }
    }

    fn on_peer_event(&mut self, event: PeerEvent) {
        let state = self.state;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match event {
            PeerEvent::LocalCandidate(candidate) => {
                if session.description_sent {
                    self.outbox.push_back(Output::Signal {
                        partner_id: session.partner_id.clone(),
                        payload: SignalPayload::Candidate(candidate),
                    });
                } else {
                    debug!("Holding local candidate until our description is sent");
                    session.local_candidates.push(candidate);
                }
            }
            PeerEvent::IceStateChanged(ice) if ice.is_established() => {
                if state == NegotiationState::Negotiating {
                    if let Some(deadline) = session.deadline.take() {
                        deadline.abort();
                    }
                    let _ = self.transition(NegotiationState::Connected);
                }
            }
            PeerEvent::IceStateChanged(ice) if ice.is_lost() => {
                info!("ICE connection {:?}, closing session", ice);
                self.close_session(CloseReason::PeerDisconnected, true);
            }
            PeerEvent::IceStateChanged(ice) => debug!("ICE {:?}", ice),
            PeerEvent::RemoteTrack(stream) => {
                session.remote_stream = Some(stream.clone());
                self.outbox.push_back(Output::RemoteStream(stream));
            }
            PeerEvent::DataChannelOpen => {
                session.channel_open = true;
                self.outbox.push_back(Output::ChannelOpen);
            }
            PeerEvent::DataChannelMessage(text) => {
                if session.channel_open {
                    self.outbox.push_back(Output::ChatReceived(text));
                } else {
                    debug!("Dropping chat message received before the channel opened");
                }
            }
            PeerEvent::DataChannelClosed => session.channel_open = false,
        }
    }

    /// Queues our offer or answer followed by the candidates held back for it.
    fn send_description(&mut self, payload: SignalPayload) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.description_sent = true;
        let held = std::mem::take(&mut session.local_candidates);
        let partner_id = session.partner_id.clone();

        self.outbox.push_back(Output::Signal {
            partner_id: partner_id.clone(),
            payload,
        });
        for candidate in held {
            self.outbox.push_back(Output::Signal {
                partner_id: partner_id.clone(),
                payload: SignalPayload::Candidate(candidate),
            });
        }
    }

    fn close_session(&mut self, reason: CloseReason, notify_server: bool) {
        let Some(session) = self.session.take() else {
            return;
        };
        let partner_id = session.partner_id.clone();
        session.release();

        let _ = self.transition(NegotiationState::Closed);
        self.outbox.push_back(Output::SessionClosed(reason));
        if notify_server {
            self.outbox.push_back(Output::LeavePartner {
                partner_id: Some(partner_id),
            });
        }
    }

    fn fail(&mut self, error: NegotiationError) {
        error!("Session failed: {}", error);
        let partner_id = self.teardown();

        let _ = self.transition(NegotiationState::Failed);
        self.outbox.push_back(Output::Failure(error));
        self.outbox.push_back(Output::LeavePartner { partner_id });
    }

    fn fail_media(&mut self, error: MediaError) {
        warn!("Media acquisition failed: {:?}", error);
        let partner_id = self.teardown();

        let _ = self.transition(NegotiationState::Failed);
        self.outbox.push_back(Output::MediaError(error));
        self.outbox.push_back(Output::LeavePartner { partner_id });
        let _ = self.transition(NegotiationState::Idle);
    }

    fn teardown(&mut self) -> Option<ClientId> {
        let session = self.session.take()?;
        let partner_id = session.partner_id.clone();
        session.release();
        Some(partner_id)
    }

    fn transition(&mut self, to: NegotiationState) -> Result<(), NegotiationError> {
        let from = self.state;
        if !from.can_transition_to(to) {
            let err = NegotiationError::InvalidTransition { from, to };
            warn!("{}", err);
            return Err(err);
        }

        debug!("Negotiation {:?} -> {:?}", from, to);
        self.state = to;
        self.outbox.push_back(Output::StateChanged { from, to });
        Ok(())
    }

    fn sink(&self, generation: u64) -> PeerEventSink {
        let tx = self.internal_tx.clone();
        PeerEventSink::new(move |event| {
            let _ = tx.send(Internal {
                generation,
                event: InternalEvent::Peer(event),
            });
        })
    }
}

async fn prepare(
    role: Role,
    connector: Arc<dyn PeerConnector>,
    media_devices: Arc<dyn MediaDevices>,
    media_slot: SharedMediaSlot,
    sink: PeerEventSink,
) -> Result<Prepared, SetupFailure> {
    let media = media_devices
        .acquire_audio()
        .await
        .map_err(SetupFailure::Media)?;

    {
        let mut slot = lock_slot(&media_slot);
        if slot.released {
            media.stop();
            return Err(SetupFailure::Negotiation(NegotiationError::Transport(
                "session ended during setup".to_owned(),
            )));
        }
        slot.media = Some(media.clone());
    }

    let transport = match connector.connect(sink).await {
        Ok(transport) => transport,
        Err(e) => {
            media.stop();
            return Err(SetupFailure::Negotiation(NegotiationError::Transport(
                format!("{e:#}"),
            )));
        }
    };

    match open(role, transport.as_ref(), &media).await {
        Ok(offer) => Ok(Prepared {
            transport,
            media,
            offer,
        }),
        Err(e) => {
            media.stop();
            spawn_close(transport);
            Err(SetupFailure::Negotiation(e))
        }
    }
}

async fn open(
    role: Role,
    transport: &dyn PeerTransport,
    media: &LocalMedia,
) -> Result<Option<SessionDescription>, NegotiationError> {
    transport
        .add_local_audio(media)
        .await
        .map_err(|e| NegotiationError::Transport(format!("{e:#}")))?;

    if !role.is_caller() {
        return Ok(None);
    }

    transport
        .create_data_channel(CHAT_CHANNEL_LABEL)
        .await
        .map_err(|e| NegotiationError::Transport(format!("{e:#}")))?;

    let offer = transport
        .create_offer()
        .await
        .map_err(|e| NegotiationError::Sdp(format!("{e:#}")))?;
    transport
        .set_local_description(offer.clone())
        .await
        .map_err(|e| NegotiationError::Sdp(format!("{e:#}")))?;

    Ok(Some(offer))
}

fn spawn_candidates(transport: Arc<dyn PeerTransport>, candidates: Vec<IceCandidate>) {
    tokio::spawn(async move {
        for candidate in candidates {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Failed to add ICE candidate: {:#}", e);
            }
        }
    });
}

fn spawn_close(transport: Arc<dyn PeerTransport>) {
    tokio::spawn(async move {
        if let Err(e) = transport.close().await {
            debug!("Error while closing transport: {:#}", e);
        }
    });
}
