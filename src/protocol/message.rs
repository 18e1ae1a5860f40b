use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message types a client may send, in the order they are advertised.
pub const SUPPORTED_TYPES: [&str; 4] = ["ping", "echo", "broadcast", "stats"];

/// Inbound envelope after decoding.
///
/// Payload fields are kept as raw JSON so they can be handed back to the peer
/// exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Carries the whole inbound envelope, which `pong` returns verbatim.
    Ping { envelope: Value },
    Echo { message: Value },
    Broadcast { message: Value },
    Stats,
    Unknown { kind: String },
}

impl ClientMessage {
    /// The `type` discriminant this message was decoded from.
    pub fn kind(&self) -> &str {
        match self {
            ClientMessage::Ping { .. } => "ping",
            ClientMessage::Echo { .. } => "echo",
            ClientMessage::Broadcast { .. } => "broadcast",
            ClientMessage::Stats => "stats",
            ClientMessage::Unknown { kind } => kind,
        }
    }
}

/// `server_info` block of the welcome envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub host: String,
    pub port: u16,
    pub uptime: f64,
    pub total_clients: usize,
}

/// `stats` block of `stats_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub connected_clients: usize,
    pub total_messages: u64,
    pub uptime_seconds: f64,
    pub server_host: String,
    pub server_port: u16,
}

/// `server_stats` block of `periodic_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    pub connected_clients: usize,
    pub total_messages: u64,
    pub uptime: f64,
}

/// Every envelope the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        message: String,
        server_info: ServerInfo,
        timestamp: String,
    },
    Pong {
        original_message: Value,
        server_time: String,
        message_count: u64,
    },
    EchoResponse {
        original_message: Value,
        echoed_at: String,
        message_count: u64,
    },
    Broadcast {
        message: Value,
        sender: String,
        timestamp: String,
        total_clients: usize,
    },
    BroadcastConfirm {
        message: String,
        recipients: usize,
        timestamp: String,
    },
    StatsResponse {
        stats: Stats,
        timestamp: String,
    },
    PeriodicUpdate {
        message: String,
        server_stats: ServerStats,
        timestamp: String,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        received: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        supported_types: Option<Vec<String>>,
        timestamp: String,
    },
}

impl ServerMessage {
    /// Reply to a frame that is not valid JSON. `received` is already truncated.
    pub fn invalid_json(received: String) -> Self {
        ServerMessage::Error {
            message: "Invalid JSON format".to_string(),
            received: Some(received),
            supported_types: None,
            timestamp: timestamp(),
        }
    }

    pub fn unknown_type(kind: &str) -> Self {
        ServerMessage::Error {
            message: format!("Unknown message type: {kind}"),
            received: None,
            supported_types: Some(SUPPORTED_TYPES.iter().map(|t| t.to_string()).collect()),
            timestamp: timestamp(),
        }
    }

    /// Generic reply for a handler that failed.
    pub fn internal_error() -> Self {
        ServerMessage::Error {
            message: "Internal server error".to_string(),
            received: None,
            supported_types: None,
            timestamp: timestamp(),
        }
    }

    /// The `type` discriminant this envelope serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::EchoResponse { .. } => "echo_response",
            ServerMessage::Broadcast { .. } => "broadcast",
            ServerMessage::BroadcastConfirm { .. } => "broadcast_confirm",
            ServerMessage::StatsResponse { .. } => "stats_response",
            ServerMessage::PeriodicUpdate { .. } => "periodic_update",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Current time as an RFC 3339 UTC string with microsecond precision.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
