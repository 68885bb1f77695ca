use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use duet::client::media::SilentMicrophone;
use duet::client::negotiation::CloseReason;
use duet::client::peer::RtcConnector;
use duet::client::{ClientConfig, Session, SessionEvent, SessionHandle, connect_signaling};
use duet::model::{IceServerConfig, MessageOrigin};
use duet::utils::DEFAULT_STUN_ADDR;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Talk to a random stranger from the terminal.
#[derive(Parser)]
#[command(name = "duet", version)]
struct Cli {
    /// WebSocket endpoint of the signaling server.
    #[arg(long, default_value = "ws://127.0.0.1:3001/ws")]
    url: String,

    /// STUN server; repeat to use several.
    #[arg(long = "stun", default_value = DEFAULT_STUN_ADDR)]
    stun: Vec<String>,

    /// Look for a new partner whenever the current one goes away.
    #[arg(long)]
    auto_rejoin: bool,

    /// Seconds to wait for a connection before giving up on a partner.
    #[arg(long, default_value_t = 30)]
    negotiation_timeout: u64,
}

const HELP: &str = "/next  find someone new\n/hangup  end the call\n/mute  toggle microphone\n/quit  exit\nanything else is sent as chat";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig {
        ice_servers: cli.stun.into_iter().map(IceServerConfig::stun).collect(),
        negotiation_timeout: Duration::from_secs(cli.negotiation_timeout),
        auto_rejoin: cli.auto_rejoin,
        ..ClientConfig::default()
    };

    let link = connect_signaling(&cli.url)
        .await
        .context("Is duet-server running?")?;
    let connector = Arc::new(RtcConnector::new(config.ice_servers.clone()));
    let handle = Session::spawn(config, link, connector, Arc::new(SilentMicrophone::new()));

    println!("{}", "Connected to the lobby.".green().bold());
    println!("{}", HELP.dimmed());

    tokio::spawn(print_events(handle.subscribe()));
    handle.start_search().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !handle_line(&handle, line.trim()).await? {
            break;
        }
    }

    handle.hang_up().await?;
    Ok(())
}

/// Returns false when the user wants to quit.
async fn handle_line(handle: &SessionHandle, line: &str) -> Result<bool> {
    match line {
        "" => {}
        "/quit" => return Ok(false),
        "/help" => println!("{}", HELP.dimmed()),
        "/next" => handle.start_search().await?,
        "/hangup" => handle.hang_up().await?,
        "/mute" => {
            if handle.toggle_mute().await? {
                println!("{}", "Microphone muted.".yellow());
            } else {
                println!("{}", "Microphone live.".yellow());
            }
        }
        text => {
            if !handle.send_text(text).await? {
                println!("{}", "Not connected, message not sent.".red());
            }
        }
    }
    Ok(true)
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            SessionEvent::Matched { partner_id } => {
                println!("{} {}", "Found someone:".cyan(), partner_id);
            }
            SessionEvent::StateChanged { to, .. } => {
                println!("{}", format!("[{:?}]", to).dimmed());
            }
            SessionEvent::RemoteStreamReady(stream) => {
                println!("{} {}", "Receiving audio:".cyan(), stream.codec);
            }
            SessionEvent::ChatReady => println!("{}", "You can chat now.".green()),
            SessionEvent::Chat(message) => match message.sender {
                MessageOrigin::Peer => {
                    println!("{} {}", "stranger:".magenta().bold(), message.text)
                }
                MessageOrigin::Local => println!("{} {}", "you:".blue().bold(), message.text),
            },
            SessionEvent::MediaError(message) => println!("{}", message.red()),
            SessionEvent::Failure(message) => {
                println!("{} {}", "Connection failed:".red(), message);
                println!("{}", "Type /next to try again.".dimmed());
            }
            SessionEvent::Closed(reason) => {
                let text = match reason {
                    CloseReason::LocalHangup => "You left the conversation.",
                    CloseReason::PartnerLeft => "Stranger has left the conversation.",
                    CloseReason::PeerDisconnected => "Peer disconnected.",
                };
                println!("{}", text.yellow());
            }
        }
    }
}
