use std::sync::Arc;

use brainwave_driver::PerChannel;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, warn};
use warp::ws::{Message, WebSocket};
use warp::Filter;

use crate::error::ProtocolError;

/// Inbound control-channel command. `channels`, when present on `start`,
/// overrides the configured channel set for that session.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundCommand {
    pub command: String,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
}

/// The three recognized commands, parsed and validated from an
/// [`InboundCommand`].
#[derive(Clone, Debug)]
pub enum Command {
    Start { channels: Option<Vec<String>> },
    Stop,
    Quit,
}

pub fn parse_command(text: &str) -> Result<Command, ProtocolError> {
    let inbound: InboundCommand = serde_json::from_str(text)?;
    match inbound.command.as_str() {
        "start" => Ok(Command::Start {
            channels: inbound.channels,
        }),
        "stop" => Ok(Command::Stop),
        "quit" => Ok(Command::Quit),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

/// Outbound event envelopes, tagged on the wire by `address`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "address", rename_all = "snake_case")]
pub enum OutEnvelope {
    Eeg { data: Vec<PerChannel> },
    Log {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    BrainflowEvent { event: String, timestamp: u64 },
}

impl OutEnvelope {
    pub fn log(message: impl Into<String>) -> Self {
        OutEnvelope::Log {
            message: message.into(),
            status: None,
        }
    }

    pub fn log_with_status(message: impl Into<String>, status: impl Into<String>) -> Self {
        OutEnvelope::Log {
            message: message.into(),
            status: Some(status.into()),
        }
    }
}

/// Broadcasts outbound envelopes to every connected control-channel client.
/// Slow or disconnected clients have their frames dropped with a warning
/// rather than blocking the broadcaster.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
}

impl Broadcaster {
    pub fn new(queue_depth: usize) -> Self {
        let (tx, _) = broadcast::channel(queue_depth);
        Self { tx }
    }

    pub fn send(&self, envelope: &OutEnvelope) {
        match serde_json::to_string(envelope) {
            Ok(json) => {
                // An error here just means there are currently no subscribers.
                let _ = self.tx.send(json);
            }
            Err(e) => warn!(error = %e, "failed to serialize outbound envelope"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

/// Wires the warp WebSocket route for the control channel. Each connection
/// gets a forwarding task (broadcast -> client) and a reader loop (client ->
/// `commands_tx`). Commands get a received-ack envelope immediately; the
/// caller sends the success/error follow-up once the command is processed.
pub fn routes(
    broadcaster: Broadcaster,
    commands_tx: mpsc::Sender<Command>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let broadcaster = Arc::new(broadcaster);
    warp::path("eeg")
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let broadcaster = broadcaster.clone();
            let commands_tx = commands_tx.clone();
            ws.on_upgrade(move |socket| handle_client(socket, broadcaster, commands_tx))
        })
}

async fn handle_client(ws: WebSocket, broadcaster: Arc<Broadcaster>, commands_tx: mpsc::Sender<Command>) {
    let (ws_tx, mut ws_rx) = ws.split();
    let ws_tx = Arc::new(Mutex::new(ws_tx));
    info!("control channel client connected");

    let mut rx = broadcaster.subscribe();
    let forward_tx = ws_tx.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(text) => {
                    if forward_tx.lock().await.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "control channel client lagged, dropping missed frames");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "control channel read error");
                break;
            }
        };
        if !msg.is_text() {
            continue;
        }
        let text = msg.to_str().unwrap_or_default();
        match parse_command(text) {
            Ok(command) => {
                broadcaster.send(&OutEnvelope::log("command received"));
                if commands_tx.send(command).await.is_err() {
                    warn!("command channel closed, dropping control-channel message");
                }
            }
            Err(e) => {
                warn!(error = %e, "malformed or unknown control-channel command");
                broadcaster.send(&OutEnvelope::log_with_status(e.to_string(), "error"));
            }
        }
    }

    forward_task.abort();
    info!("control channel client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_channel_override() {
        let cmd = parse_command(r#"{"command":"start","channels":["Cz","Pz"]}"#).unwrap();
        match cmd {
            Command::Start { channels } => assert_eq!(channels, Some(vec!["Cz".into(), "Pz".into()])),
            _ => panic!("expected Start"),
        }
    }

    #[test]
    fn parses_stop_and_quit() {
        assert!(matches!(parse_command(r#"{"command":"stop"}"#).unwrap(), Command::Stop));
        assert!(matches!(parse_command(r#"{"command":"quit"}"#).unwrap(), Command::Quit));
    }

    #[test]
    fn rejects_unknown_command() {
        let err = parse_command(r#"{"command":"frobnicate"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownCommand(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_command("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedJson(_)));
    }

    #[test]
    fn eeg_envelope_serializes_with_address_tag() {
        let envelope = OutEnvelope::Eeg { data: vec![] };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""address":"eeg""#));
    }

    #[test]
    fn brainflow_event_envelope_uses_snake_case_address() {
        let envelope = OutEnvelope::BrainflowEvent {
            event: "connected".into(),
            timestamp: 123,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""address":"brainflow_event""#));
    }
}
