//! WebSocket transport
//!
//! This file implements the WebSocket server that carries the relay
//! protocol. Responsibilities:
//! - Accept TCP/WebSocket connections until the shutdown signal fires
//! - Create a `Connection` for each peer, register it and send the welcome
//! - Forward every text or binary frame to the `MessageRouter`
//! - Keep peers alive with periodic pings and close the ones that go silent
//! - Unregister exactly once when the connection ends, however it ends
//! - On shutdown, close every session and stop the heartbeat before returning

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::{CloseFrame, Message as WsMessage};

use crate::broadcast::{self, BroadcastEngine};
use crate::config::{RelaySettings, Settings};
use crate::heartbeat::HeartbeatScheduler;
use crate::protocol::SUPPORTED_TYPES;
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};
use crate::router::MessageRouter;
use crate::utils::RelayError;

/// How long a finished session waits for its writer to flush queued frames.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How long shutdown waits for sessions to close before aborting them.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Transport liveness policy.
#[derive(Debug, Clone, Copy)]
pub struct Keepalive {
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
}

impl From<&RelaySettings> for Keepalive {
    fn from(relay: &RelaySettings) -> Self {
        Self {
            ping_interval: relay.ping_interval().max(MIN_PING_INTERVAL),
            idle_timeout: relay.idle_timeout(),
        }
    }
}

/// Binds to the configured address and serves until `shutdown` resolves.
pub async fn start_websocket_server(
    settings: Settings,
    shutdown: impl Future<Output = ()>,
) -> Result<(), RelayError> {
    let addr = settings.server.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.clone(),
            source,
        })?;

    serve(listener, Arc::new(ConnectionRegistry::new()), settings, shutdown).await
}

/// Serves relay connections accepted on `listener` until `shutdown` resolves.
///
/// The heartbeat runs for as long as this future does and is shut down
/// before it returns.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    settings: Settings,
    shutdown: impl Future<Output = ()>,
) -> Result<(), RelayError> {
    let local_addr = listener.local_addr()?;
    let broadcaster = BroadcastEngine::new(registry.clone());
    let router = MessageRouter::new(
        registry.clone(),
        broadcaster.clone(),
        settings.server.host.clone(),
        local_addr.port(),
    );
    let keepalive = Keepalive::from(&settings.relay);

    let heartbeat = HeartbeatScheduler::new(
        registry.clone(),
        broadcaster,
        settings.relay.heartbeat_interval(),
    )
    .spawn();

    info!("WebSocket server listening on ws://{local_addr}");
    info!("Supported message types: {}", SUPPORTED_TYPES.join(", "));

    tokio::pin!(shutdown);

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let registry = registry.clone();
                    let router = router.clone();
                    let stop = stop_rx.clone();

                    sessions.spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, registry, router, keepalive, stop).await {
                            warn!("Connection from {peer} failed: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {e}");
                }
            },
            Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = finished {
                    warn!("Session task ended abnormally: {e}");
                }
            }
        }
    }

    drop(listener);
    let _ = stop_tx.send(true);

    let open = sessions.len();
    let drained = time::timeout(SESSION_DRAIN_TIMEOUT, async {
        while sessions.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            "Aborting {} of {open} sessions that did not close in time",
            sessions.len()
        );
        sessions.shutdown().await;
    }

    heartbeat.shutdown().await;
    info!("WebSocket server shutdown complete");
    Ok(())
}

/// Aborts the writer task if the session is dropped before it finishes.
struct WriterTask(JoinHandle<()>);

impl Drop for WriterTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Unregisters its connection when dropped, so a session that ends for any
/// reason (including a panic) leaves the registry exactly once.
struct Registration {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    router: MessageRouter,
    keepalive: Keepalive,
    mut stop: watch::Receiver<bool>,
) -> Result<(), RelayError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let conn = Connection::new(peer, tx);
    let conn_id = conn.id;

    // The welcome is queued before the connection is visible to any fan-out.
    registry.register_with(conn.clone(), |conn, snapshot| {
        if let Err(e) = broadcast::deliver_to(conn, &router.welcome(snapshot)) {
            warn!("Failed to queue welcome for {}: {e}", conn.id);
        }
    });
    let registration = Registration {
        registry: registry.clone(),
        id: conn_id,
    };

    // Spawn a task to forward queued frames → socket
    let mut writer = WriterTask(tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                debug!("Failed to send message to {conn_id}: {e}");
                break;
            }
        }
        debug!("Send loop closed for {conn_id}");
    }));

    let mut ping = time::interval_at(
        Instant::now() + keepalive.ping_interval,
        keepalive.ping_interval,
    );
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(msg)) => {
                    last_seen = Instant::now();
                    match msg {
                        WsMessage::Text(text) => router.dispatch(&conn, text.as_str()),
                        WsMessage::Binary(data) => router.dispatch_bytes(&conn, &data),
                        // the close reply is flushed by the next read, which then ends the stream
                        WsMessage::Close(_) => debug!("{conn_id} started closing"),
                        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                    }
                }
                Some(Err(e)) => {
                    debug!("Connection {conn_id} ended with error: {e}");
                    break;
                }
                None => break,
            },
            _ = ping.tick() => {
                if last_seen.elapsed() > keepalive.idle_timeout {
                    info!("Closing idle connection {conn_id}");
                    queue(&conn, WsMessage::Close(None));
                    break;
                }
                queue(&conn, WsMessage::Ping(Default::default()));
            }
            // also fires if the server dropped the sender
            _ = stop.changed() => {
                debug!("Closing {conn_id} for shutdown");
                queue(&conn, WsMessage::Close(Some(CloseFrame {
                    code: CloseCode::Away,
                    reason: "server shutting down".into(),
                })));
                break;
            }
        }
    }

    drop(registration);
    drop(conn);

    // The writer ends once every queue handle is gone; dropping it aborts a stuck send.
    let _ = time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer.0).await;
    drop(writer);

    info!("{peer} disconnected");
    Ok(())
}

/// Queues a control frame; the writer may already be gone if the socket failed.
fn queue(conn: &Connection, msg: WsMessage) {
    if conn.send(msg).is_err() {
        debug!("Writer for {} already closed, dropping control frame", conn.id);
    }
}
