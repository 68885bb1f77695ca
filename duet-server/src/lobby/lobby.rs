use crate::error::LobbyError;
use crate::lobby::lobby_command::{LobbyCommand, LobbySnapshot};
use crate::lobby::matchmaker::{JoinOutcome, Matchmaker, PairLookup};
use crate::signaling::SignalingOutput;
use duet_core::ClientId;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Owns the waiting pool and the partner directory.
///
/// Every `join`, `leave` and relay runs inside this one task, so they are
/// serialized with respect to each other.
pub struct Lobby {
    matchmaker: Matchmaker,
    command_rx: mpsc::Receiver<LobbyCommand>,
    signaling: Arc<dyn SignalingOutput>,
}

impl Lobby {
    pub fn new(
        command_rx: mpsc::Receiver<LobbyCommand>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        Self {
            matchmaker: Matchmaker::new(),
            command_rx,
            signaling,
        }
    }

    /// Starts the event loop on the current runtime.
    pub fn spawn(signaling: Arc<dyn SignalingOutput>) -> LobbyHandle {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(Lobby::new(rx, signaling).run());
        LobbyHandle { tx }
    }

    pub async fn run(mut self) {
        info!("Lobby event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Command channel closed. Lobby event loop finished");
    }

    async fn handle_command(&mut self, cmd: LobbyCommand) {
        match cmd {
            LobbyCommand::Join { client_id } => self.join(client_id).await,

            LobbyCommand::Signal {
                from,
                target,
                signal_data,
            } => self.relay(from, target, signal_data).await,

            LobbyCommand::Hangup { client_id } => {
                info!("Hangup from {}", client_id);
                self.leave(&client_id).await;
            }

            LobbyCommand::Disconnect { client_id } => {
                info!("Cleaning up after {}", client_id);
                self.leave(&client_id).await;
            }

            LobbyCommand::Inspect { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn join(&mut self, client_id: ClientId) {
        match self.matchmaker.join(&client_id) {
            JoinOutcome::Queued => info!("{} joined the waiting pool", client_id),
            JoinOutcome::Matched { partner_id } => {
                self.signaling
                    .send_matched(client_id.clone(), partner_id.clone())
                    .await;
                self.signaling.send_matched(partner_id, client_id).await;
            }
            JoinOutcome::AlreadyWaiting | JoinOutcome::AlreadyPaired => {
                debug!("Ignoring join from {}: not idle", client_id);
            }
        }
    }

    async fn relay(&mut self, from: ClientId, target: ClientId, signal_data: Value) {
        match self.matchmaker.lookup(&from) {
            PairLookup::Unpaired => {
                debug!("Dropping signal from unpaired {}", from);
            }
            PairLookup::Paired(partner_id) if partner_id == target => {
                debug!("Relaying signal from {} to {}", from, partner_id);
                self.signaling.send_signal(partner_id, signal_data).await;
            }
            PairLookup::Paired(partner_id) => {
                warn!(
                    "Dropping signal from {} addressed to {}; current partner is {}",
                    from, target, partner_id
                );
            }
            PairLookup::Broken(partner_id) => {
                error!("Broken pairing {} <-> {}, dissolving it", from, partner_id);
                self.leave(&from).await;
                self.leave(&partner_id).await;
                self.signaling.send_user_left(from).await;
            }
        }
    }

    async fn leave(&mut self, client_id: &ClientId) {
        for orphan in self.matchmaker.leave(client_id) {
            info!("Notifying {} that {} left", orphan, client_id);
            self.signaling.send_user_left(orphan).await;
        }
    }

    fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            waiting: self.matchmaker.waiting().cloned().collect(),
            pairs: self.matchmaker.pairs(),
        }
    }
}

/// Cloneable sender side of the lobby event loop.
#[derive(Clone)]
pub struct LobbyHandle {
    tx: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    pub fn new(tx: mpsc::Sender<LobbyCommand>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, cmd: LobbyCommand) -> Result<(), LobbyError> {
        self.tx.send(cmd).await.map_err(|_| LobbyError::Closed)
    }

    pub async fn join(&self, client_id: ClientId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Join { client_id }).await
    }

    pub async fn signal(
        &self,
        from: ClientId,
        target: ClientId,
        signal_data: Value,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Signal {
            from,
            target,
            signal_data,
        })
        .await
    }

    pub async fn hangup(&self, client_id: ClientId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Hangup { client_id }).await
    }

    pub async fn disconnect(&self, client_id: ClientId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Disconnect { client_id }).await
    }

    /// Returns once every command sent before it has been applied.
    pub async fn snapshot(&self) -> Result<LobbySnapshot, LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.send(LobbyCommand::Inspect { reply }).await?;
        rx.await.map_err(|_| LobbyError::Closed)
    }
}
