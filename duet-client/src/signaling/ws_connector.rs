use crate::signaling::SignalingLink;
use anyhow::{Context, Result};
use duet_core::{ClientEvent, ServerEvent};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Opens a WebSocket to the signaling server and pumps JSON frames through
/// a `SignalingLink`.
///
/// The link's `incoming` side closes when the socket does.
pub async fn connect_signaling(url: &str) -> Result<SignalingLink> {
    let (ws_stream, _) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to signaling server at {url}"))?;
    info!("Connected to signaling server at {}", url);

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<ClientEvent>();
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<ServerEvent>();

    tokio::spawn(async move {
        while let Some(event) = outgoing_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize {:?}: {}", event, e);
                    continue;
                }
            };
            if ws_write.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_write.close().await;
    });

    tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_read.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ServerEvent>(text.as_str()) {
                    Ok(event) => {
                        if incoming_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Invalid ServerEvent: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
        debug!("Signaling socket closed");
    });

    Ok(SignalingLink::new(outgoing_tx, incoming_rx))
}
