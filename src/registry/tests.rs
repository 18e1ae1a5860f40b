use super::{Connection, ConnectionId, ConnectionRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

fn connection(port: u16) -> (Connection, mpsc::UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    (Connection::new(addr, tx), rx)
}

#[test]
fn test_connection_new() {
    let (a, _rx_a) = connection(5000);
    let (b, _rx_b) = connection(5000);
    assert_ne!(a.id, b.id);
    assert_eq!(a.remote_addr.port(), 5000);
    assert!(a.id.to_string().starts_with("conn-"));
}

#[test]
fn test_connection_send_after_receiver_dropped() {
    let (conn, rx) = connection(5000);
    assert!(!conn.is_closed());
    drop(rx);
    assert!(conn.is_closed());
    assert!(conn.send(WsMessage::text("hello")).is_err());
}

#[test]
fn test_register_returns_snapshot() {
    let registry = ConnectionRegistry::new();
    let (a, _rx_a) = connection(5000);
    let (b, _rx_b) = connection(5001);

    assert_eq!(registry.register(a).connected_clients, 1);
    let snapshot = registry.register(b);
    assert_eq!(snapshot.connected_clients, 2);
    assert_eq!(snapshot.total_messages, 0);
    assert!(snapshot.uptime_seconds >= 0.0);
}

#[test]
fn test_double_register_is_a_no_op() {
    let registry = ConnectionRegistry::new();
    let (a, _rx) = connection(5000);

    registry.register(a.clone());
    let snapshot = registry.register(a.clone());
    assert_eq!(snapshot.connected_clients, 1);
    assert!(registry.contains(&a.id));
}

#[test]
fn test_unregister_is_idempotent() {
    let registry = ConnectionRegistry::new();
    let (a, _rx_a) = connection(5000);
    let (b, _rx_b) = connection(5001);
    registry.register(a.clone());
    registry.register(b.clone());

    assert!(registry.unregister(&a.id));
    assert!(!registry.unregister(&a.id));
    assert!(!registry.unregister(&ConnectionId::new()));
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(&b.id));
}

#[test]
fn test_same_address_is_not_deduplicated() {
    let registry = ConnectionRegistry::new();
    let (a, _rx_a) = connection(5000);
    let (b, _rx_b) = connection(5000);
    registry.register(a);
    registry.register(b);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_record_message_is_monotonic() {
    let registry = ConnectionRegistry::new();
    assert_eq!(registry.record_message(), 1);
    assert_eq!(registry.record_message(), 2);
    assert_eq!(registry.total_messages(), 2);
    assert_eq!(registry.snapshot().total_messages, 2);
}

#[test]
fn test_connections_is_a_stable_copy() {
    let registry = ConnectionRegistry::new();
    let (a, _rx_a) = connection(5000);
    let (b, _rx_b) = connection(5001);
    registry.register(a.clone());
    registry.register(b);

    let copy = registry.connections();
    registry.unregister(&a.id);

    assert_eq!(copy.len(), 2);
    assert_eq!(registry.connections().len(), 1);
}

#[test]
fn test_concurrent_register_and_unregister() {
    let registry = Arc::new(ConnectionRegistry::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let mut receivers = Vec::new();
                for j in 0..50u16 {
                    let (conn, rx) = connection(6000 + i * 50 + j);
                    receivers.push(rx);
                    registry.register(conn.clone());
                    registry.record_message();
                    if j % 2 == 0 {
                        registry.unregister(&conn.id);
                    }
                }
                receivers
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), 8 * 25);
    assert_eq!(registry.total_messages(), 8 * 50);
}

#[test]
fn test_register_with_runs_before_connection_is_visible() {
    let registry = ConnectionRegistry::new();
    let (a, _rx_a) = connection(5000);
    let (b, _rx_b) = connection(5001);
    registry.register(a);

    let mut seen = None;
    let snapshot = registry.register_with(b.clone(), |conn, snapshot| {
        seen = Some((conn.id, snapshot.connected_clients));
    });

    assert_eq!(seen, Some((b.id, 2)));
    assert_eq!(snapshot.connected_clients, 2);
    assert!(registry.contains(&b.id));
}

#[test]
fn test_register_with_skips_hook_for_known_id() {
    let registry = ConnectionRegistry::new();
    let (a, _rx) = connection(5000);
    registry.register(a.clone());

    let mut called = false;
    let snapshot = registry.register_with(a, |_, _| called = true);
    assert!(!called);
    assert_eq!(snapshot.connected_clients, 1);
}

#[test]
fn test_greeting_is_first_frame_despite_concurrent_fan_out() {
    use crate::broadcast::BroadcastEngine;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    let registry = Arc::new(ConnectionRegistry::new());
    let engine = BroadcastEngine::new(registry.clone());
    let stop = Arc::new(AtomicBool::new(false));

    let fan_out = {
        let stop = stop.clone();
        std::thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                engine.broadcast(json!("noise"), None);
            }
        })
    };

    let mut receivers = Vec::new();
    for port in 7000..7200u16 {
        let (conn, rx) = connection(port);
        registry.register_with(conn, |conn, _| {
            conn.send(WsMessage::text("greeting")).unwrap();
        });
        receivers.push(rx);
    }

    stop.store(true, Ordering::Relaxed);
    fan_out.join().unwrap();

    for mut rx in receivers {
        match rx.try_recv().expect("greeting queued") {
            WsMessage::Text(text) => assert_eq!(text.as_str(), "greeting"),
            other => panic!("Expected a text message, got {other:?}"),
        }
    }
}
