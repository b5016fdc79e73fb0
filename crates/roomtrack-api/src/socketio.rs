//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! The presence backend is a Socket.IO server. Over a WebSocket transport
//! every text frame is one Engine.IO packet: a single type digit followed
//! by an optional payload. Engine.IO `message` packets (type `4`) carry a
//! Socket.IO packet, which again starts with a type digit, then an
//! optional `/namespace,` prefix, an optional numeric ack id, and a JSON
//! payload:
//!
//! ```text
//! 0{"sid":"abc","pingInterval":25000,"pingTimeout":20000}   engine open
//! 2                                                          engine ping
//! 40                                                         socket connect (client → server)
//! 40{"sid":"def"}                                            socket connect ack
//! 42["updatePersons",[{...}]]                                socket event
//! 42/admin,7["hello",1]                                      namespaced event with ack id
//! 41                                                         socket disconnect
//! ```
//!
//! Binary packets (socket types `5` and `6`) are not used by the presence
//! backend and are rejected as protocol errors.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// Engine.IO protocol revision spoken by this client.
pub const ENGINE_IO_VERSION: &str = "4";

/// The namespace every presence event lives in.
pub const DEFAULT_NAMESPACE: &str = "/";

// ── Engine.IO ────────────────────────────────────────────────────────

/// Handshake payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the connection may stay silent before it is considered dead.
    pub fn heartbeat_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// One Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Decode a WebSocket text frame.
    pub fn decode(frame: &str) -> Result<Self, Error> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty Engine.IO frame".into()))?;
        let payload = chars.as_str();

        match kind {
            '0' => serde_json::from_str(payload)
                .map(Self::Open)
                .map_err(|e| Error::Protocol(format!("invalid open handshake: {e}"))),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(payload.to_owned())),
            '3' => Ok(Self::Pong(payload.to_owned())),
            '4' => Ok(Self::Message(payload.to_owned())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(Error::Protocol(format!(
                "unknown Engine.IO packet type {other:?}"
            ))),
        }
    }

    /// Encode for sending. `Open` is server-only and encodes as a bare `0`.
    pub fn encode(&self) -> String {
        match self {
            Self::Open(_) => "0".to_owned(),
            Self::Close => "1".to_owned(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".to_owned(),
            Self::Noop => "6".to_owned(),
        }
    }
}

// ── Socket.IO ────────────────────────────────────────────────────────

/// One Socket.IO packet, carried inside an Engine.IO `message`.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
}

impl SocketPacket {
    /// Client request to join the default namespace (`40`).
    pub fn connect_default() -> Self {
        Self::Connect {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            data: None,
        }
    }

    /// Client notice that it leaves the default namespace (`41`).
    pub fn disconnect_default() -> Self {
        Self::Disconnect {
            namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Decode the payload of an Engine.IO `message` packet.
    pub fn decode(payload: &str) -> Result<Self, Error> {
        let mut chars = payload.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty Socket.IO packet".into()))?;
        let rest = chars.as_str();

        let (namespace, rest) = split_namespace(rest);
        let (ack_id, rest) = split_ack_id(rest)?;
        let data = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(rest)
                    .map_err(|e| Error::Protocol(format!("invalid Socket.IO payload: {e}")))?,
            )
        };

        match kind {
            '0' => Ok(Self::Connect { namespace, data }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let (name, args) = split_event(data)?;
                Ok(Self::Event {
                    namespace,
                    ack_id,
                    name,
                    args,
                })
            }
            '3' => {
                let ack_id =
                    ack_id.ok_or_else(|| Error::Protocol("ack packet without id".into()))?;
                let args = match data {
                    Some(Value::Array(args)) => args,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                Ok(Self::Ack {
                    namespace,
                    ack_id,
                    args,
                })
            }
            '4' => Ok(Self::ConnectError {
                namespace,
                message: connect_error_message(data),
            }),
            '5' | '6' => Err(Error::Protocol("binary Socket.IO packets are not supported".into())),
            other => Err(Error::Protocol(format!(
                "unknown Socket.IO packet type {other:?}"
            ))),
        }
    }

    /// Encode as the payload of an Engine.IO `message` packet.
    pub fn encode(&self) -> String {
        let (kind, namespace) = match self {
            Self::Connect { namespace, .. } => ('0', namespace),
            Self::Disconnect { namespace } => ('1', namespace),
            Self::Event { namespace, .. } => ('2', namespace),
            Self::Ack { namespace, .. } => ('3', namespace),
            Self::ConnectError { namespace, .. } => ('4', namespace),
        };

        let mut out = String::new();
        out.push(kind);
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }

        match self {
            Self::Connect { data: Some(data), .. } => out.push_str(&data.to_string()),
            Self::Connect { data: None, .. } | Self::Disconnect { .. } => {}
            Self::Event {
                ack_id, name, args, ..
            } => {
                if let Some(id) = ack_id {
                    out.push_str(&id.to_string());
                }
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                out.push_str(&Value::Array(array).to_string());
            }
            Self::Ack { ack_id, args, .. } => {
                out.push_str(&ack_id.to_string());
                out.push_str(&Value::Array(args.clone()).to_string());
            }
            Self::ConnectError { message, .. } => {
                out.push_str(&serde_json::json!({ "message": message }).to_string());
            }
        }
        out
    }

    /// Wrap in an Engine.IO `message` packet, ready for the wire.
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

// ── Parsing helpers ──────────────────────────────────────────────────

fn split_namespace(rest: &str) -> (String, &str) {
    if rest.starts_with('/') {
        match rest.split_once(',') {
            Some((ns, tail)) => (ns.to_owned(), tail),
            None => (rest.to_owned(), ""),
        }
    } else {
        (DEFAULT_NAMESPACE.to_owned(), rest)
    }
}

fn split_ack_id(rest: &str) -> Result<(Option<u64>, &str), Error> {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Ok((None, rest));
    }
    let (id, tail) = rest.split_at(digits);
    let id = id
        .parse::<u64>()
        .map_err(|e| Error::Protocol(format!("invalid ack id {id:?}: {e}")))?;
    Ok((Some(id), tail))
}

fn split_event(data: Option<Value>) -> Result<(String, Vec<Value>), Error> {
    let Some(Value::Array(mut items)) = data else {
        return Err(Error::Protocol("event payload must be a JSON array".into()));
    };
    if items.is_empty() {
        return Err(Error::Protocol("event payload has no name".into()));
    }
    match items.remove(0) {
        Value::String(name) => Ok((name, items)),
        other => Err(Error::Protocol(format!("event name must be a string, got {other}"))),
    }
}

fn connect_error_message(data: Option<Value>) -> String {
    match data {
        Some(Value::String(message)) => message,
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| Value::Object(map.clone()).to_string(), str::to_owned),
        Some(other) => other.to_string(),
        None => "connection refused".to_owned(),
    }
}
