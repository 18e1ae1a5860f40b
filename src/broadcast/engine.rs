//! Broadcast engine
//!
//! Fans one envelope out to every open connection, optionally skipping the
//! sender. The set of recipients is a copy taken from the registry when the
//! fan-out starts, so connections joining or leaving meanwhile neither skip
//! nor duplicate a delivery.
//!
//! Deliveries only enqueue onto each connection's unbounded channel, so a
//! slow peer cannot hold up the batch. A failed enqueue (the peer is already
//! gone) is logged and recorded in the returned [`BroadcastReport`]; it never
//! aborts the remaining deliveries and never reaches the caller as an error.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::protocol::{self, ServerMessage};
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};

/// Sender name used for envelopes the server originates itself.
pub const SERVER_SENDER: &str = "server";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    ChannelClosed(ConnectionId),

    #[error("failed to serialize envelope: {0}")]
    Serialize(String),
}

/// Outcome for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub connection_id: ConnectionId,
    pub outcome: Result<(), DeliveryError>,
}

/// Per-recipient results of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub deliveries: Vec<Delivery>,
}

impl BroadcastReport {
    pub fn recipients(&self) -> usize {
        self.deliveries.len()
    }

    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.recipients() - self.delivered()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(|d| d.outcome.is_err())
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastEngine {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends a `broadcast` envelope carrying `payload` to every open
    /// connection except `sender`.
    ///
    /// The envelope names the sender by remote address, or `"server"` when
    /// there is none, and reports how many connections were open.
    pub fn broadcast(&self, payload: Value, sender: Option<&Connection>) -> BroadcastReport {
        let connections = self.registry.connections();
        let envelope = ServerMessage::Broadcast {
            message: payload,
            sender: sender
                .map(|c| c.remote_addr.to_string())
                .unwrap_or_else(|| SERVER_SENDER.to_string()),
            timestamp: protocol::timestamp(),
            total_clients: connections.len(),
        };
        deliver(&connections, &envelope, sender.map(|c| c.id))
    }

    /// Sends `envelope` as-is to every open connection except `exclude`.
    pub fn fan_out(
        &self,
        envelope: &ServerMessage,
        exclude: Option<ConnectionId>,
    ) -> BroadcastReport {
        let connections = self.registry.connections();
        deliver(&connections, envelope, exclude)
    }
}

/// Queues `envelope` for a single connection.
pub fn deliver_to(conn: &Connection, envelope: &ServerMessage) -> Result<(), DeliveryError> {
    let frame =
        protocol::to_frame(envelope).map_err(|e| DeliveryError::Serialize(e.to_string()))?;
    conn.send(frame).map_err(|_| DeliveryError::ChannelClosed(conn.id))
}

fn deliver(
    connections: &[Connection],
    envelope: &ServerMessage,
    exclude: Option<ConnectionId>,
) -> BroadcastReport {
    let recipients = connections.iter().filter(|c| Some(c.id) != exclude);

    let frame = match protocol::to_frame(envelope) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Failed to serialize {} envelope: {e}", envelope.kind());
            let reason = e.to_string();
            return BroadcastReport {
                deliveries: recipients
                    .map(|c| Delivery {
                        connection_id: c.id,
                        outcome: Err(DeliveryError::Serialize(reason.clone())),
                    })
                    .collect(),
            };
        }
    };

    let deliveries: Vec<Delivery> = recipients
        .map(|conn| {
            let outcome = conn
                .send(frame.clone())
                .map_err(|_| DeliveryError::ChannelClosed(conn.id));
            if let Err(e) = &outcome {
                warn!("Failed to deliver {} to {}: {e}", envelope.kind(), conn.id);
            }
            Delivery {
                connection_id: conn.id,
                outcome,
            }
        })
        .collect();

    let report = BroadcastReport { deliveries };
    debug!(
        "Fanned out {} to {} of {} recipients",
        envelope.kind(),
        report.delivered(),
        report.recipients()
    );
    report
}
