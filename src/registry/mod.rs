//! The `registry` module tracks the relay's live connections.
//!
//! It provides the `Connection` handle for a single peer and the
//! `ConnectionRegistry` that owns the open set, the processed-message counter
//! and the process start time.

pub mod connection;
pub mod state;

pub use connection::{Connection, ConnectionId};
pub use state::{ConnectionRegistry, RegistrySnapshot};

#[cfg(test)]
mod tests;
