use super::{BroadcastEngine, DeliveryError, SERVER_SENDER};
use crate::protocol::{ServerMessage, ServerStats};
use crate::registry::{Connection, ConnectionRegistry};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

fn connection(port: u16) -> (Connection, mpsc::UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    (Connection::new(addr, tx), rx)
}

fn received(rx: &mut mpsc::UnboundedReceiver<WsMessage>) -> ServerMessage {
    match rx.try_recv().expect("expected a queued frame") {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected a text message, got {other:?}"),
    }
}

#[test]
fn test_broadcast_excludes_sender() {
    let registry = Arc::new(ConnectionRegistry::new());
    let engine = BroadcastEngine::new(registry.clone());
    let (a, mut rx_a) = connection(5000);
    let (b, mut rx_b) = connection(5001);
    let (c, mut rx_c) = connection(5002);
    registry.register(a.clone());
    registry.register(b);
    registry.register(c);

    let report = engine.broadcast(json!("hello"), Some(&a));
    assert_eq!(report.recipients(), 2);
    assert_eq!(report.delivered(), 2);
    assert!(report.deliveries.iter().all(|d| d.connection_id != a.id));

    for rx in [&mut rx_b, &mut rx_c] {
        match received(rx) {
            ServerMessage::Broadcast {
                message,
                sender,
                total_clients,
                ..
            } => {
                assert_eq!(message, json!("hello"));
                assert_eq!(sender, "127.0.0.1:5000");
                assert_eq!(total_clients, 3);
            }
            other => panic!("Expected broadcast, got {other:?}"),
        }
    }
    assert!(rx_a.try_recv().is_err());
}

#[test]
fn test_broadcast_without_sender_reaches_everyone() {
    let registry = Arc::new(ConnectionRegistry::new());
    let engine = BroadcastEngine::new(registry.clone());
    let (a, mut rx_a) = connection(5000);
    let (b, mut rx_b) = connection(5001);
    registry.register(a);
    registry.register(b);

    let report = engine.broadcast(json!({ "k": 1 }), None);
    assert_eq!(report.delivered(), 2);
    for rx in [&mut rx_a, &mut rx_b] {
        match received(rx) {
            ServerMessage::Broadcast { sender, .. } => assert_eq!(sender, SERVER_SENDER),
            other => panic!("Expected broadcast, got {other:?}"),
        }
    }
}

#[test]
fn test_closed_recipient_does_not_abort_batch() {
    let registry = Arc::new(ConnectionRegistry::new());
    let engine = BroadcastEngine::new(registry.clone());
    let (a, _rx_a) = connection(5000);
    let (dead, rx_dead) = connection(5001);
    let (c, mut rx_c) = connection(5002);
    registry.register(a.clone());
    registry.register(dead.clone());
    registry.register(c);
    drop(rx_dead);

    let report = engine.broadcast(json!("still here"), Some(&a));
    assert_eq!(report.recipients(), 2);
    assert_eq!(report.delivered(), 1);
    assert_eq!(report.failed(), 1);

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.connection_id, dead.id);
    assert_eq!(failure.outcome, Err(DeliveryError::ChannelClosed(dead.id)));
    assert!(matches!(received(&mut rx_c), ServerMessage::Broadcast { .. }));
}

#[test]
fn test_broadcast_to_empty_registry() {
    let engine = BroadcastEngine::new(Arc::new(ConnectionRegistry::new()));
    let report = engine.broadcast(json!("nobody"), None);
    assert_eq!(report.recipients(), 0);
    assert_eq!(report.failed(), 0);
}

#[test]
fn test_lone_sender_gets_nothing() {
    let registry = Arc::new(ConnectionRegistry::new());
    let engine = BroadcastEngine::new(registry.clone());
    let (a, mut rx_a) = connection(5000);
    registry.register(a.clone());

    let report = engine.broadcast(json!("echo?"), Some(&a));
    assert_eq!(report.recipients(), 0);
    assert!(rx_a.try_recv().is_err());
}

#[test]
fn test_fan_out_sends_envelope_unchanged() {
    let registry = Arc::new(ConnectionRegistry::new());
    let engine = BroadcastEngine::new(registry.clone());
    let (a, mut rx_a) = connection(5000);
    registry.register(a);

    let envelope = ServerMessage::PeriodicUpdate {
        message: "Server heartbeat".to_string(),
        server_stats: ServerStats {
            connected_clients: 1,
            total_messages: 0,
            uptime: 0.5,
        },
        timestamp: "t".to_string(),
    };
    let report = engine.fan_out(&envelope, None);
    assert_eq!(report.delivered(), 1);
    assert_eq!(received(&mut rx_a), envelope);
}
