//! Presence push channel with auto-reconnect.
//!
//! Connects to the presence backend's Socket.IO endpoint and republishes
//! the lifecycle and `updatePersons` snapshots as [`ChannelEvent`]s through
//! a [`tokio::sync::broadcast`] channel. Reconnection with exponential
//! backoff + jitter is handled here, so consumers only ever see
//! open/close/data events.
//!
//! # Example
//!
//! ```rust,ignore
//! use roomtrack_api::channel::{ChannelEvent, PresenceChannel, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let channel = PresenceChannel::new(
//!     &Url::parse("http://localhost:5005")?,
//!     ReconnectConfig::default(),
//!     CancellationToken::new(),
//! )?;
//! let mut rx = channel.subscribe();
//! let task = channel.start();
//!
//! while let Ok(event) = rx.recv().await {
//!     if let ChannelEvent::Snapshot(entries) = event.as_ref() {
//!         println!("{} people", entries.len());
//!     }
//! }
//!
//! channel.shutdown();
//! task.await?;
//! ```

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::PresenceEntry;
use crate::socketio::{DEFAULT_NAMESPACE, ENGINE_IO_VERSION, EnginePacket, SocketPacket};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Silence allowed before the Engine.IO handshake arrives.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Event name carrying full-replace presence snapshots.
pub const SNAPSHOT_EVENT: &str = "updatePersons";

// ── ChannelEvent ─────────────────────────────────────────────────────

/// Lifecycle and data events surfaced to the core.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The server accepted the namespace connection.
    Connected,
    /// A full presence snapshot. Replaces everything previously delivered.
    Snapshot(Vec<PresenceEntry>),
    /// An established session ended.
    Disconnected { reason: String },
    /// A connection attempt failed before the session was established.
    Error { message: String },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for channel reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` retries forever, `Some(0)` never reconnects.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// A config that makes exactly one connection attempt.
    pub fn disabled() -> Self {
        Self {
            max_retries: Some(0),
            ..Self::default()
        }
    }
}

// ── PresenceChannel ──────────────────────────────────────────────────

/// Handle to the presence push channel.
///
/// Subscribe before calling [`start`](Self::start) to observe the first
/// `Connected` event. [`shutdown`](Self::shutdown) leaves the namespace
/// politely and stops the background task.
#[derive(Debug)]
pub struct PresenceChannel {
    url: Url,
    reconnect: ReconnectConfig,
    events: broadcast::Sender<Arc<ChannelEvent>>,
    cancel: CancellationToken,
}

impl PresenceChannel {
    /// Build a channel for the Socket.IO server rooted at `socket_url`.
    pub fn new(
        socket_url: &Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let url = socket_endpoint(socket_url)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            url,
            reconnect,
            events,
            cancel,
        })
    }

    /// The resolved WebSocket URL.
    pub fn endpoint(&self) -> &Url {
        &self.url
    }

    /// Get a new broadcast receiver for channel events.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChannelEvent>> {
        self.events.subscribe()
    }

    /// Spawn the connect/reconnect loop.
    pub fn start(&self) -> JoinHandle<()> {
        let url = self.url.clone();
        let events = self.events.clone();
        let reconnect = self.reconnect.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            channel_loop(url, events, reconnect, cancel).await;
        })
    }

    /// Signal the background task to leave the namespace and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Turn the server root into the Engine.IO WebSocket endpoint.
///
/// `http://host:5005` → `ws://host:5005/socket.io/?EIO=4&transport=websocket`
pub fn socket_endpoint(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::WebSocketConnect(format!(
                "unsupported URL scheme {other:?} for presence channel"
            )));
        }
    };

    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::WebSocketConnect(format!("cannot use {scheme} for {base}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(["socket.io", ""]);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket");
    url.set_fragment(None);
    Ok(url)
}

// ── Background reconnection loop ─────────────────────────────────────

/// Why a session ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Closed {
    /// WebSocket or Engine.IO transport closed. Worth reconnecting.
    Transport(String),
    /// The server kicked us out of the namespace. Final.
    ServerDisconnect,
    /// Local shutdown.
    Cancelled,
}

/// Main loop: connect → read → on close/error, backoff → reconnect.
async fn channel_loop(
    url: Url,
    events: broadcast::Sender<Arc<ChannelEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let mut connected = false;
        let outcome = connect_and_read(&url, &events, &cancel, &mut connected).await;

        match outcome {
            Ok(Closed::Cancelled) => break,
            Ok(Closed::ServerDisconnect) => {
                tracing::info!("presence channel closed by server");
                emit(
                    &events,
                    ChannelEvent::Disconnected {
                        reason: "io server disconnect".into(),
                    },
                );
                break;
            }
            Ok(Closed::Transport(reason)) => {
                tracing::info!(%reason, "presence channel transport closed");
                if connected {
                    attempt = 0;
                    emit(&events, ChannelEvent::Disconnected { reason });
                } else {
                    emit(&events, ChannelEvent::Error { message: reason });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "presence channel error");
                if connected {
                    attempt = 0;
                    emit(
                        &events,
                        ChannelEvent::Disconnected {
                            reason: e.to_string(),
                        },
                    );
                } else {
                    emit(
                        &events,
                        ChannelEvent::Error {
                            message: e.to_string(),
                        },
                    );
                }
            }
        }

        if let Some(max) = reconnect.max_retries {
            if attempt >= max {
                tracing::info!(max_retries = max, "presence channel not reconnecting");
                break;
            }
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    tracing::debug!("presence channel loop exiting");
}

fn emit(events: &broadcast::Sender<Arc<ChannelEvent>>, event: ChannelEvent) {
    // No receivers just means nobody is listening right now.
    let _ = events.send(Arc::new(event));
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Run one WebSocket session until it ends.
///
/// `connected` flips to `true` once the server acknowledges the namespace
/// connection, so the caller can tell a dropped session from a failed
/// attempt.
async fn connect_and_read(
    url: &Url,
    events: &broadcast::Sender<Arc<ChannelEvent>>,
    cancel: &CancellationToken,
    connected: &mut bool,
) -> Result<Closed, Error> {
    tracing::info!(url = %url, "connecting to presence channel");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let connect = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri));
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(Closed::Cancelled),
        result = connect => result.map_err(|e| Error::WebSocketConnect(e.to_string()))?,
    };

    tracing::debug!("WebSocket open, awaiting Engine.IO handshake");

    let (mut write, mut read) = ws_stream.split();
    let mut idle_window = HANDSHAKE_TIMEOUT;

    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                leave(&mut write).await;
                return Ok(Closed::Cancelled);
            }
            frame = tokio::time::timeout(idle_window, read.next()) => frame,
        };

        let Ok(frame) = frame else {
            return Err(Error::HeartbeatTimeout {
                silent_secs: idle_window.as_secs(),
            });
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let packet = match EnginePacket::decode(text.as_str()) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::debug!(error = %e, "ignoring malformed Engine.IO frame");
                        continue;
                    }
                };

                match packet {
                    EnginePacket::Open(handshake) => {
                        tracing::debug!(
                            sid = %handshake.sid,
                            ping_interval = handshake.ping_interval,
                            ping_timeout = handshake.ping_timeout,
                            "Engine.IO handshake"
                        );
                        idle_window = handshake.heartbeat_window();
                        send_frame(&mut write, SocketPacket::connect_default().to_frame()).await?;
                    }
                    EnginePacket::Ping(data) => {
                        tracing::trace!("Engine.IO ping");
                        send_frame(&mut write, EnginePacket::Pong(data).encode()).await?;
                    }
                    EnginePacket::Close => {
                        return Ok(Closed::Transport("transport close".into()));
                    }
                    EnginePacket::Message(payload) => {
                        if let Some(closed) = handle_socket_packet(&payload, events, connected)? {
                            return Ok(closed);
                        }
                    }
                    EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(cf) => {
                        tracing::debug!(code = %cf.code, reason = %cf.reason, "WebSocket close frame");
                        format!("WebSocket closed (code {})", cf.code)
                    }
                    None => "WebSocket closed".to_owned(),
                };
                return Ok(Closed::Transport(reason));
            }
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
            None => return Ok(Closed::Transport("WebSocket stream ended".into())),
            Some(Ok(_)) => {
                // Binary, ping/pong control frames: tungstenite answers pings itself.
            }
        }
    }
}

/// React to one Socket.IO packet. Returns `Some` when the session is over.
fn handle_socket_packet(
    payload: &str,
    events: &broadcast::Sender<Arc<ChannelEvent>>,
    connected: &mut bool,
) -> Result<Option<Closed>, Error> {
    let packet = match SocketPacket::decode(payload) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed Socket.IO packet");
            return Ok(None);
        }
    };

    if packet.namespace() != DEFAULT_NAMESPACE {
        tracing::trace!(namespace = packet.namespace(), "packet for foreign namespace");
        return Ok(None);
    }

    match packet {
        SocketPacket::Connect { .. } => {
            tracing::info!("presence channel connected");
            *connected = true;
            emit(events, ChannelEvent::Connected);
        }
        SocketPacket::Disconnect { .. } => return Ok(Some(Closed::ServerDisconnect)),
        SocketPacket::ConnectError { message, .. } => {
            return Err(Error::ConnectRefused { message });
        }
        SocketPacket::Event { name, args, .. } if name == SNAPSHOT_EVENT => {
            if let Some(entries) = snapshot_from_args(args) {
                tracing::debug!(count = entries.len(), "presence snapshot");
                emit(events, ChannelEvent::Snapshot(entries));
            }
        }
        SocketPacket::Event { name, .. } => {
            tracing::trace!(event = %name, "ignoring event");
        }
        SocketPacket::Ack { .. } => {}
    }
    Ok(None)
}

/// Pull the entry list out of `updatePersons` arguments.
///
/// The first argument must be an array; a payload of any other shape is
/// ignored rather than treated as an empty snapshot. Individual entries
/// that fail to deserialize are skipped.
fn snapshot_from_args(args: Vec<Value>) -> Option<Vec<PresenceEntry>> {
    let Some(Value::Array(items)) = args.into_iter().next() else {
        tracing::debug!("{SNAPSHOT_EVENT} payload is not an array, ignoring");
        return None;
    };

    let entries = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<PresenceEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed presence entry");
                None
            }
        })
        .collect();
    Some(entries)
}

async fn send_frame<S>(write: &mut S, frame: String) -> Result<(), Error>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    tracing::trace!(%frame, "sending frame");
    write
        .send(Message::text(frame))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

/// Best-effort namespace disconnect + WebSocket close on shutdown.
async fn leave<S>(write: &mut S)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    if let Err(e) = send_frame(write, SocketPacket::disconnect_default().to_frame()).await {
        tracing::debug!(error = %e, "failed to send namespace disconnect");
    }
    if let Err(e) = write.close().await {
        tracing::debug!(error = %e, "failed to close WebSocket");
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
