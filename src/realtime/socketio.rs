//! Socket.IO v2 framing over an Engine.IO v3 websocket.

use super::channel::{PushChannel, PushConnector};
use super::events::RawEvent;
use crate::error::{ErrorKind, GoError, GoResult};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, interval_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument, warn};

/// Engine.IO ping frame.
pub const PING: &str = "2";
/// Engine.IO pong frame.
pub const PONG: &str = "3";

const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Engine.IO handshake.
    Open {
        /// Keepalive interval the server expects.
        ping_interval: Duration,
    },
    /// Engine.IO close.
    Close,
    /// Keepalive probe.
    Ping,
    /// Keepalive answer.
    Pong,
    /// Socket.IO namespace connected.
    Connect,
    /// Socket.IO namespace disconnected.
    Disconnect,
    /// A named event.
    Event(RawEvent),
    /// Anything else (acks, upgrades, noops).
    Other(String),
}

#[derive(serde::Deserialize)]
struct Handshake {
    #[serde(rename = "pingInterval")]
    ping_interval: u64,
}

/// Encodes an event frame: `42["name",payload]`.
pub fn encode_event(name: &str, payload: &serde_json::Value) -> String {
    format!("42{}", serde_json::json!([name, payload]))
}

/// Decodes one text frame.
///
/// # Errors
///
/// [`ErrorKind::MalformedEvent`] for an event frame whose body is not a
/// `[name, payload]` array, or an unparseable handshake.
#[instrument(level = "trace")]
pub fn decode_frame(text: &str) -> GoResult<Frame> {
    let malformed = |reason: String| {
        GoError::new(ErrorKind::MalformedEvent {
            topic: "socket.io".to_string(),
            reason,
        })
    };
    let mut chars = text.chars();
    let kind = chars.next();
    let rest = chars.as_str();
    match kind {
        Some('0') => {
            let handshake: Handshake =
                serde_json::from_str(rest).map_err(|e| malformed(e.to_string()))?;
            Ok(Frame::Open {
                ping_interval: Duration::from_millis(handshake.ping_interval),
            })
        }
        Some('1') => Ok(Frame::Close),
        Some('2') => Ok(Frame::Ping),
        Some('3') => Ok(Frame::Pong),
        Some('4') => decode_packet(rest).map_err(malformed),
        _ => Ok(Frame::Other(text.to_string())),
    }
}

fn decode_packet(packet: &str) -> Result<Frame, String> {
    let mut chars = packet.chars();
    let kind = chars.next();
    let rest = chars.as_str();
    match kind {
        Some('0') => Ok(Frame::Connect),
        Some('1') => Ok(Frame::Disconnect),
        Some('2') => {
            // Optional "/namespace," prefix, then an optional numeric ack id.
            let rest = match rest.strip_prefix('/') {
                Some(ns) => ns.split_once(',').map_or("", |(_, body)| body),
                None => rest,
            };
            let body = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let values: Vec<serde_json::Value> =
                serde_json::from_str(body).map_err(|e| e.to_string())?;
            let mut values = values.into_iter();
            let name = match values.next() {
                Some(serde_json::Value::String(name)) => name,
                other => return Err(format!("event name missing, got {other:?}")),
            };
            let payload = values.next().unwrap_or(serde_json::Value::Null);
            Ok(Frame::Event(RawEvent::new(name, payload)))
        }
        _ => Ok(Frame::Other(packet.to_string())),
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens Socket.IO channels over a websocket URL.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    /// Creates a connector for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait::async_trait]
impl PushConnector for WebSocketConnector {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn open(&self) -> GoResult<Box<dyn PushChannel>> {
        info!("Opening realtime websocket");
        let (socket, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| GoError::new(ErrorKind::ConnectFailed(e.to_string())))?;
        debug!(status = %response.status(), "Websocket handshake complete");
        Ok(Box::new(SocketIoChannel::new(socket)))
    }
}

/// A websocket speaking Socket.IO text frames.
pub struct SocketIoChannel {
    socket: Socket,
    ping: Interval,
}

impl SocketIoChannel {
    fn new(socket: Socket) -> Self {
        Self {
            socket,
            ping: keepalive(DEFAULT_PING_INTERVAL),
        }
    }

    async fn send_text(&mut self, text: String) -> GoResult<()> {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| GoError::new(ErrorKind::Transport(e.to_string())))
    }
}

fn keepalive(period: Duration) -> Interval {
    let period = period.max(Duration::from_secs(1));
    interval_at(Instant::now() + period, period)
}

#[async_trait::async_trait]
impl PushChannel for SocketIoChannel {
    #[instrument(skip(self, payload))]
    async fn emit(&mut self, name: &str, payload: serde_json::Value) -> GoResult<()> {
        debug!("Emitting event");
        self.send_text(encode_event(name, &payload)).await
    }

    async fn recv(&mut self) -> Option<GoResult<RawEvent>> {
        loop {
            tokio::select! {
                _ = self.ping.tick() => {
                    if let Err(e) = self.send_text(PING.to_string()).await {
                        return Some(Err(e));
                    }
                }
                message = self.socket.next() => {
                    let text = match message {
                        None | Some(Ok(Message::Close(_))) => return None,
                        Some(Err(e)) => {
                            return Some(Err(GoError::new(ErrorKind::Transport(e.to_string()))));
                        }
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(_)) => continue,
                    };
                    match decode_frame(&text) {
                        Ok(Frame::Event(event)) => return Some(Ok(event)),
                        Ok(Frame::Ping) => {
                            if let Err(e) = self.send_text(PONG.to_string()).await {
                                return Some(Err(e));
                            }
                        }
                        Ok(Frame::Open { ping_interval }) => {
                            debug!(?ping_interval, "Engine.IO handshake");
                            self.ping = keepalive(ping_interval);
                        }
                        Ok(Frame::Close) | Ok(Frame::Disconnect) => return None,
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Dropping undecodable frame"),
                    }
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn close(&mut self) -> GoResult<()> {
        info!("Closing realtime websocket");
        self.socket
            .close(None)
            .await
            .map_err(|e| GoError::new(ErrorKind::Transport(e.to_string())))
    }
}
