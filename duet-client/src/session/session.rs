use crate::config::ClientConfig;
use crate::media::MediaDevices;
use crate::negotiation::{CloseReason, Internal, NegotiationState, Negotiator, Output};
use crate::peer::PeerConnector;
use crate::session::{AppState, SessionCommand, SessionEvent, SessionHandle, SessionSnapshot};
use crate::signaling::SignalingLink;
use duet_core::{ChatMessage, ClientEvent, ClientId, MessageOrigin, ServerEvent, SignalPayload};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

/// Orchestrates one client: the signaling link, the negotiator and the
/// state published to the UI.
pub struct Session {
    config: ClientConfig,
    link: SignalingLink,
    negotiator: Negotiator,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    command_rx: mpsc::Receiver<SessionCommand>,
    snapshot: SessionSnapshot,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
    next_message_id: u64,
}

impl Session {
    pub fn new(
        config: ClientConfig,
        link: SignalingLink,
        connector: Arc<dyn PeerConnector>,
        media_devices: Arc<dyn MediaDevices>,
    ) -> (Self, SessionHandle) {
        let (negotiator, internal_rx) = Negotiator::new(&config, connector, media_devices);
        let (tx, command_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let (events_tx, _) = broadcast::channel(256);

        let handle = SessionHandle {
            tx,
            snapshot_rx,
            events_tx: events_tx.clone(),
        };
        let session = Self {
            config,
            link,
            negotiator,
            internal_rx,
            command_rx,
            snapshot: SessionSnapshot::default(),
            snapshot_tx,
            events_tx,
            next_message_id: 0,
        };
        (session, handle)
    }

    /// Starts the loop on the current runtime.
    pub fn spawn(
        config: ClientConfig,
        link: SignalingLink,
        connector: Arc<dyn PeerConnector>,
        media_devices: Arc<dyn MediaDevices>,
    ) -> SessionHandle {
        let (session, handle) = Session::new(config, link, connector, media_devices);
        tokio::spawn(session.run());
        handle
    }

    pub async fn run(mut self) {
        info!("Session loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        debug!("All session handles dropped");
                        self.negotiator.hang_up();
                        self.flush();
                        break;
                    }
                },
                event = self.link.incoming.recv() => match event {
                    Some(event) => self.handle_server_event(event),
                    None => {
                        warn!("Signaling link closed");
                        self.negotiator.hang_up();
                        self.flush();
                        break;
                    }
                },
                Some(internal) = self.internal_rx.recv() => {
                    self.negotiator.handle_internal(internal);
                }
            }

            self.flush();
        }

        info!("Session loop finished");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::StartSearch => {
                self.snapshot.messages.clear();
                self.snapshot.last_media_error = None;
                self.snapshot.last_error = None;
                self.negotiator.start_search();
            }
            SessionCommand::HangUp => self.negotiator.hang_up(),
            SessionCommand::SendText { text, reply } => {
                let _ = reply.send(self.send_text(text).await);
            }
            SessionCommand::ToggleMute { reply } => {
                let muted = self.negotiator.toggle_mute();
                let _ = reply.send(muted);
            }
        }
    }

    async fn send_text(&mut self, text: String) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        if !self.negotiator.send_text(&text).await {
            return false;
        }

        let message = self.push_message(text, MessageOrigin::Local);
        self.emit(SessionEvent::Chat(message));
        true
    }

    fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Welcome { client_id } => {
                info!("Server assigned id {}", client_id);
                self.snapshot.client_id = Some(client_id);
            }
            ServerEvent::Matched { partner_id } => self.on_matched(partner_id),
            ServerEvent::Signal { signal_data } => match SignalPayload::decode(signal_data) {
                Ok(payload) => {
                    debug!("Received {}", payload.name());
                    self.negotiator.on_signal(payload);
                }
                Err(e) => warn!("Dropping undecodable signal: {}", e),
            },
            ServerEvent::UserLeft => {
                info!("Partner left");
                self.negotiator.on_partner_left();
            }
        }
    }

    fn on_matched(&mut self, partner_id: ClientId) {
        let Some(local_id) = self.snapshot.client_id.clone() else {
            error!("Matched with {} before the server assigned an id", partner_id);
            self.send(ClientEvent::Hangup {
                partner_id: Some(partner_id),
            });
            return;
        };

        self.negotiator.on_matched(&local_id, partner_id.clone());
        if self.negotiator.partner_id() == Some(&partner_id) {
            self.emit(SessionEvent::Matched { partner_id });
        }
    }

    /// Applies negotiator outputs and publishes the resulting snapshot.
    fn flush(&mut self) {
        loop {
            let outputs: Vec<Output> = self.negotiator.drain().collect();
            if outputs.is_empty() {
                break;
            }

            let mut rejoin = false;
            for output in outputs {
                rejoin |= self.apply(output);
            }

            if rejoin && self.negotiator.state() == NegotiationState::Closed {
                info!("Searching again");
                self.snapshot.messages.clear();
                self.negotiator.start_search();
            }
        }

        self.snapshot.state = self.negotiator.state();
        self.snapshot.app_state = AppState::from(self.snapshot.state);
        self.snapshot.partner_id = self.negotiator.partner_id().cloned();
        self.snapshot.role = self.negotiator.role();
        self.snapshot.remote_stream = self.negotiator.remote_stream().cloned();
        self.snapshot.chat_ready = self.negotiator.chat_ready();
        self.snapshot.muted = self.negotiator.is_muted();
        self.snapshot_tx.send_replace(self.snapshot.clone());
    }

    /// Returns true if the session should search again.
    fn apply(&mut self, output: Output) -> bool {
        match output {
            Output::JoinPool => self.send(ClientEvent::JoinWaitingPool {
                preferences: self.config.preferences.clone(),
            }),
            Output::LeavePartner { partner_id } => self.send(ClientEvent::Hangup { partner_id }),
            Output::Signal {
                partner_id,
                payload,
            } => match payload.encode() {
                Ok(signal_data) => self.send(ClientEvent::Signal {
                    partner_id,
                    signal_data,
                }),
                Err(e) => error!("Failed to encode {}: {}", payload.name(), e),
            },
            Output::StateChanged { from, to } => {
                self.emit(SessionEvent::StateChanged { from, to });
            }
            Output::RemoteStream(stream) => self.emit(SessionEvent::RemoteStreamReady(stream)),
            Output::ChannelOpen => self.emit(SessionEvent::ChatReady),
            Output::ChatReceived(text) => {
                let message = self.push_message(text, MessageOrigin::Peer);
                self.emit(SessionEvent::Chat(message));
            }
            Output::MediaError(e) => {
                let message = e.to_string();
                self.snapshot.last_media_error = Some(message.clone());
                self.emit(SessionEvent::MediaError(message));
            }
            Output::Failure(e) => {
                let message = e.to_string();
                self.snapshot.last_error = Some(message.clone());
                self.emit(SessionEvent::Failure(message));
            }
            Output::SessionClosed(reason) => {
                self.emit(SessionEvent::Closed(reason));
                return self.config.auto_rejoin && reason != CloseReason::LocalHangup;
            }
        }
        false
    }

    fn push_message(&mut self, text: String, sender: MessageOrigin) -> ChatMessage {
        self.next_message_id += 1;
        let message = ChatMessage {
            id: self.next_message_id,
            text,
            sender,
        };
        self.snapshot.messages.push(message.clone());
        message
    }

    fn send(&self, event: ClientEvent) {
        if self.link.outgoing.send(event).is_err() {
            warn!("Signaling link closed, dropping outgoing event");
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }
}
