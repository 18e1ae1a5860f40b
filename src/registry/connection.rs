//! Connection handle
//!
//! `Connection` models one open peer and holds the sending side of its
//! outbound queue. The transport owns the socket; everything else reaches the
//! peer through `sender`.

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::error::SendError;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Cloning yields another handle to the same peer; identity is the `id`.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub remote_addr: SocketAddr,
    pub joined_at: DateTime<Utc>,
    sender: UnboundedSender<WsMessage>,
}

impl Connection {
    /// Create a new connection with a fresh id.
    pub fn new(remote_addr: SocketAddr, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: ConnectionId::new(),
            remote_addr,
            joined_at: Utc::now(),
            sender,
        }
    }

    /// Queues a frame for the peer. Fails once the transport has dropped the
    /// receiving end.
    pub fn send(&self, msg: WsMessage) -> Result<(), SendError<WsMessage>> {
        self.sender.send(msg)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}
