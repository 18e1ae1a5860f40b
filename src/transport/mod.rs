//! The `transport` module is responsible for handling network communication
//! with peers via WebSockets.
//!
//! It accepts connections, runs one session task per peer that feeds text
//! frames to the router, applies the keepalive policy and makes sure every
//! closed connection is removed from the registry.

pub mod websocket;

pub use websocket::{Keepalive, serve, start_websocket_server};
