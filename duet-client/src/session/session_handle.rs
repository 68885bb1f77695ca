use crate::error::SessionError;
use crate::session::{SessionCommand, SessionEvent, SessionSnapshot};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Cloneable front end of a running `Session`.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) tx: mpsc::Sender<SessionCommand>,
    pub(crate) snapshot_rx: watch::Receiver<SessionSnapshot>,
    pub(crate) events_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.tx.send(cmd).await.map_err(|_| SessionError::Closed)
    }

    /// Joins the pool, hanging up the current partner first if there is one.
    pub async fn start_search(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StartSearch).await
    }

    pub async fn hang_up(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::HangUp).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::SendText {
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Returns whether local audio is muted afterwards.
    pub async fn toggle_mute(&self) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::ToggleMute { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Waits until the published snapshot satisfies `condition`.
    pub async fn wait_for(
        &self,
        mut condition: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|s| condition(s))
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }
}
