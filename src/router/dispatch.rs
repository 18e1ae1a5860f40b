//! Message router
//!
//! Takes one inbound frame (text, or binary holding UTF-8) from a
//! connection, decides which handler runs and builds the reply. Every call
//! counts as one processed message, including frames that fail to decode;
//! the count is taken after decoding so the reply can report it.
//!
//! Handlers return `Result`; any error is logged and answered with a generic
//! `error` envelope so a bad frame never ends the connection.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::broadcast::{self, BroadcastEngine};
use crate::protocol::{self, ClientMessage, DecodeError, ServerInfo, ServerMessage, Stats};
use crate::registry::{Connection, ConnectionRegistry, RegistrySnapshot};
use crate::utils::RelayError;

pub const WELCOME_MESSAGE: &str = "Connected to WebSocket Relay";
pub const BROADCAST_CONFIRM_MESSAGE: &str = "Message broadcasted successfully";

#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    broadcaster: BroadcastEngine,
    host: String,
    port: u16,
}

impl MessageRouter {
    /// `host` and `port` are only reported back to peers in `welcome` and
    /// `stats_response`.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broadcaster: BroadcastEngine,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            host: host.into(),
            port,
        }
    }

    /// Builds the greeting for a connection that was just registered.
    pub fn welcome(&self, snapshot: RegistrySnapshot) -> ServerMessage {
        ServerMessage::Welcome {
            message: WELCOME_MESSAGE.to_string(),
            server_info: ServerInfo {
                host: self.host.clone(),
                port: self.port,
                uptime: snapshot.uptime_seconds,
                total_clients: snapshot.connected_clients,
            },
            timestamp: protocol::timestamp(),
        }
    }

    /// Routes `frame` from `sender` and queues the reply on the sender's
    /// connection.
    pub fn dispatch(&self, sender: &Connection, frame: &str) {
        let reply = self.route(sender, frame);
        self.reply(sender, &reply);
    }

    /// Binary counterpart of [`dispatch`](Self::dispatch).
    pub fn dispatch_bytes(&self, sender: &Connection, frame: &[u8]) {
        let reply = self.route_bytes(sender, frame);
        self.reply(sender, &reply);
    }

    fn reply(&self, sender: &Connection, reply: &ServerMessage) {
        if let Err(e) = broadcast::deliver_to(sender, reply) {
            warn!("Could not reply {} to {}: {e}", reply.kind(), sender.id);
        }
    }

    /// Routes `frame` from `sender` and returns the reply for the sender.
    pub fn route(&self, sender: &Connection, frame: &str) -> ServerMessage {
        self.route_decoded(sender, protocol::decode(frame))
    }

    /// Routes a binary frame. Payloads that are not UTF-8 get the invalid
    /// JSON reply.
    pub fn route_bytes(&self, sender: &Connection, frame: &[u8]) -> ServerMessage {
        self.route_decoded(sender, protocol::decode_bytes(frame))
    }

    fn route_decoded(
        &self,
        sender: &Connection,
        decoded: Result<ClientMessage, DecodeError>,
    ) -> ServerMessage {
        let count = self.registry.record_message();

        let result = match decoded {
            Ok(msg) => {
                debug!("Received {} message from {}", msg.kind(), sender.remote_addr);
                self.handle(sender, msg, count)
            }
            Err(DecodeError::InvalidJson { received, reason }) => {
                debug!("Invalid JSON from {}: {reason}", sender.remote_addr);
                Ok(ServerMessage::invalid_json(received))
            }
            Err(e @ DecodeError::NotAnObject(_)) => {
                Err(RelayError::MalformedEnvelope(e.to_string()))
            }
        };

        result.unwrap_or_else(|e| {
            error!("Error handling message from {}: {e}", sender.id);
            ServerMessage::internal_error()
        })
    }

    fn handle(
        &self,
        sender: &Connection,
        msg: ClientMessage,
        count: u64,
    ) -> Result<ServerMessage, RelayError> {
        let reply = match msg {
            ClientMessage::Ping { envelope } => ServerMessage::Pong {
                original_message: envelope,
                server_time: protocol::timestamp(),
                message_count: count,
            },
            ClientMessage::Echo { message } => ServerMessage::EchoResponse {
                original_message: message,
                echoed_at: protocol::timestamp(),
                message_count: count,
            },
            ClientMessage::Broadcast { message } => self.handle_broadcast(sender, message),
            ClientMessage::Stats => self.stats(),
            ClientMessage::Unknown { kind } => ServerMessage::unknown_type(&kind),
        };
        Ok(reply)
    }

    fn handle_broadcast(&self, sender: &Connection, message: Value) -> ServerMessage {
        let report = self.broadcaster.broadcast(message, Some(sender));
        if report.failed() > 0 {
            warn!(
                "Broadcast from {} failed for {} of {} recipients",
                sender.id,
                report.failed(),
                report.recipients()
            );
        }

        ServerMessage::BroadcastConfirm {
            message: BROADCAST_CONFIRM_MESSAGE.to_string(),
            recipients: self.registry.len().saturating_sub(1),
            timestamp: protocol::timestamp(),
        }
    }

    fn stats(&self) -> ServerMessage {
        let snapshot = self.registry.snapshot();
        ServerMessage::StatsResponse {
            stats: Stats {
                connected_clients: snapshot.connected_clients,
                total_messages: snapshot.total_messages,
                uptime_seconds: snapshot.uptime_seconds,
                server_host: self.host.clone(),
                server_port: self.port,
            },
            timestamp: protocol::timestamp(),
        }
    }
}
