use std::time::Duration;

use anyhow::{Context, anyhow};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, client::IntoClientRequest};
use url::Url;

use crate::convai::{ConvaiConfig, build_events_ws_url};

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub const ERROR_CODE_PARSE: &str = "PARSE_ERROR";
pub const ERROR_CODE_WEBSOCKET: &str = "WEBSOCKET_ERROR";
pub const ERROR_CODE_MAX_RECONNECT: &str = "MAX_RECONNECT_ATTEMPTS";

#[derive(Clone, PartialEq, Eq)]
pub struct EventStreamConfig {
    pub ws_url: Url,
    pub api_key: String,
    pub connect_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub base_reconnect_delay: Duration,
}

impl std::fmt::Debug for EventStreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamConfig")
            .field("ws_url", &self.ws_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("connect_timeout", &self.connect_timeout)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("base_reconnect_delay", &self.base_reconnect_delay)
            .finish()
    }
}

impl EventStreamConfig {
    pub fn for_conversation(cfg: &ConvaiConfig, conversation_id: &str) -> anyhow::Result<Self> {
        Ok(Self {
            ws_url: build_events_ws_url(cfg, conversation_id)?,
            api_key: cfg.api_key.clone(),
            connect_timeout: Duration::from_secs(10),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_reconnect_delay: DEFAULT_BASE_RECONNECT_DELAY,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConvaiEvent {
    /// Socket is open (also emitted after each successful reconnect).
    Connected,
    UserTranscript { text: String },
    AgentResponse { text: String },
    ToolCall {
        tool_name: String,
        tool_call_id: Option<String>,
        parameters: Value,
    },
    Interruption,
    Ping { event_id: Option<u64> },
    Error { code: String, message: String },
    Other { kind: String, raw: Value },
}

/// Delay before reconnect attempt `attempt` (1-based): `base * 2^(attempt-1)`.
pub fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift)
}

fn str_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter().try_fold(v, |v, k| v.get(*k))?.as_str()
}

pub fn parse_event(text: &str) -> anyhow::Result<ConvaiEvent> {
    let v: Value = serde_json::from_str(text).context("decode event JSON")?;
    let kind = v
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("event without type"))?
        .to_string();

    let event = match kind.as_str() {
        "user_transcript" => ConvaiEvent::UserTranscript {
            text: str_at(&v, &["user_transcription_event", "user_transcript"])
                .unwrap_or_default()
                .to_string(),
        },
        "agent_response" => ConvaiEvent::AgentResponse {
            text: str_at(&v, &["agent_response_event", "agent_response"])
                .unwrap_or_default()
                .to_string(),
        },
        "client_tool_call" => {
            let call = v.get("client_tool_call").cloned().unwrap_or(Value::Null);
            ConvaiEvent::ToolCall {
                tool_name: str_at(&call, &["tool_name"]).unwrap_or_default().to_string(),
                tool_call_id: str_at(&call, &["tool_call_id"]).map(str::to_string),
                parameters: call.get("parameters").cloned().unwrap_or(Value::Null),
            }
        }
        "interruption" => ConvaiEvent::Interruption,
        "ping" => ConvaiEvent::Ping {
            event_id: v
                .get("ping_event")
                .and_then(|p| p.get("event_id"))
                .and_then(Value::as_u64),
        },
        "error" => ConvaiEvent::Error {
            code: str_at(&v, &["code"]).unwrap_or("VENDOR_ERROR").to_string(),
            message: str_at(&v, &["message"]).unwrap_or_default().to_string(),
        },
        _ => ConvaiEvent::Other { kind, raw: v },
    };
    Ok(event)
}

#[derive(Debug)]
enum StreamCmd {
    Shutdown,
}

#[derive(Clone)]
pub struct EventStreamHandle {
    tx: mpsc::Sender<StreamCmd>,
}

impl EventStreamHandle {
    /// Closes the socket and stops reconnecting.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(StreamCmd::Shutdown).await;
    }
}

enum SocketExit {
    Shutdown,
    NormalClose,
    Abnormal,
}

fn error_event(code: &str, message: impl Into<String>) -> ConvaiEvent {
    ConvaiEvent::Error {
        code: code.into(),
        message: message.into(),
    }
}

/// Spawns the event-stream task. Events arrive on the returned receiver, which closes
/// once the stream gives up or is shut down.
pub fn spawn_event_stream(
    cfg: EventStreamConfig,
) -> anyhow::Result<(EventStreamHandle, mpsc::Receiver<ConvaiEvent>)> {
    if cfg.api_key.trim().is_empty() {
        return Err(anyhow!("missing ElevenLabs API key"));
    }

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<StreamCmd>(4);
    let (evt_tx, evt_rx) = mpsc::channel::<ConvaiEvent>(64);

    tokio::spawn(async move {
        let mut attempts: u32 = 0;

        loop {
            let exit = match connect(&cfg).await {
                Ok(ws) => {
                    attempts = 0;
                    log::info!("event stream connected: {}", cfg.ws_url);
                    let _ = evt_tx.send(ConvaiEvent::Connected).await;
                    run_socket(ws, &mut cmd_rx, &evt_tx).await
                }
                Err(e) => {
                    log::warn!("event stream connect failed: {e:#}");
                    let _ = evt_tx
                        .send(error_event(ERROR_CODE_WEBSOCKET, "WebSocket connection error"))
                        .await;
                    SocketExit::Abnormal
                }
            };

            match exit {
                SocketExit::Shutdown | SocketExit::NormalClose => break,
                SocketExit::Abnormal => {}
            }

            if attempts >= cfg.max_reconnect_attempts {
                log::error!("event stream: max reconnect attempts reached");
                let _ = evt_tx
                    .send(error_event(ERROR_CODE_MAX_RECONNECT, "Failed to reconnect to WebSocket"))
                    .await;
                break;
            }

            attempts += 1;
            let delay = reconnect_delay(cfg.base_reconnect_delay, attempts);
            log::info!(
                "event stream reconnecting in {}ms (attempt {attempts}/{})",
                delay.as_millis(),
                cfg.max_reconnect_attempts
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(StreamCmd::Shutdown) | None => break,
                    }
                }
            }
        }
    });

    Ok((EventStreamHandle { tx: cmd_tx }, evt_rx))
}

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(cfg: &EventStreamConfig) -> anyhow::Result<Socket> {
    let mut req = cfg
        .ws_url
        .as_str()
        .into_client_request()
        .context("build websocket request")?;
    req.headers_mut().insert(
        "xi-api-key",
        cfg.api_key
            .parse()
            .map_err(|_| anyhow!("invalid ElevenLabs API key header"))?,
    );

    let (ws, _resp) = tokio::time::timeout(cfg.connect_timeout, tokio_tungstenite::connect_async(req))
        .await
        .map_err(|_| anyhow!("event stream connect timed out"))?
        .context("connect event stream websocket")?;
    Ok(ws)
}

async fn run_socket(
    mut ws: Socket,
    cmd_rx: &mut mpsc::Receiver<StreamCmd>,
    evt_tx: &mpsc::Sender<ConvaiEvent>,
) -> SocketExit {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(StreamCmd::Shutdown) | None => {
                        let _ = ws.close(None).await;
                        return SocketExit::Shutdown;
                    }
                }
            }

            msg = ws.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        log::warn!("event stream read failed: {e}");
                        let _ = evt_tx.send(error_event(ERROR_CODE_WEBSOCKET, "WebSocket connection error")).await;
                        return SocketExit::Abnormal;
                    }
                    None => return SocketExit::Abnormal,
                };

                let text = match msg {
                    Message::Text(t) => t.to_string(),
                    Message::Binary(b) => String::from_utf8_lossy(&b).to_string(),
                    Message::Ping(p) => {
                        if ws.send(Message::Pong(p)).await.is_err() {
                            return SocketExit::Abnormal;
                        }
                        continue;
                    }
                    Message::Close(frame) => {
                        let code = frame.as_ref().map(|f| f.code);
                        log::info!("event stream closed: {code:?}");
                        return if code == Some(CloseCode::Normal) {
                            SocketExit::NormalClose
                        } else {
                            SocketExit::Abnormal
                        };
                    }
                    _ => continue,
                };

                let event = match parse_event(&text) {
                    Ok(e) => e,
                    Err(e) => {
                        log::warn!("event stream: unparseable frame: {e:#}");
                        error_event(ERROR_CODE_PARSE, "Failed to parse WebSocket message")
                    }
                };

                if evt_tx.send(event).await.is_err() {
                    // Nobody is listening anymore.
                    let _ = ws.close(None).await;
                    return SocketExit::Shutdown;
                }
            }
        }
    }
}
