use tokio::sync::oneshot;

/// Requests from the UI layer into the session loop.
#[derive(Debug)]
pub enum SessionCommand {
    StartSearch,
    HangUp,
    SendText {
        text: String,
        /// True if the text went out over an open chat channel.
        reply: oneshot::Sender<bool>,
    },
    ToggleMute {
        reply: oneshot::Sender<bool>,
    },
}
