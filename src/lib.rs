//! # wsrelay
//!
//! `wsrelay` is a minimal, in-memory real-time message relay built with Rust.
//! Peers connect over WebSockets and speak a small JSON protocol: ping/pong,
//! echo, broadcast to every other peer, and server stats. The server also
//! pushes a periodic heartbeat with its status to everyone connected.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `protocol`: Envelope types and the JSON codec.
//! - `registry`: The set of open connections and the server-wide counters.
//! - `router`: Maps each inbound envelope onto its handler and builds the reply.
//! - `broadcast`: Fans one envelope out to many connections and reports per-recipient outcomes.
//! - `heartbeat`: The cancellable periodic status broadcast.
//! - `transport`: The WebSocket server and per-connection sessions.
//! - `config`: Handles loading and managing server configuration.
//! - `utils`: Shared utilities, such as error handling and logging.

pub mod broadcast;
pub mod config;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod transport;
pub mod utils;
