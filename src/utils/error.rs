//! The `error` module defines the error types used within the `wsrelay`
//! application.
//!
//! Only startup failures (configuration, bind) ever escape to the binary.
//! Everything that happens on a live connection is turned into a protocol
//! `error` envelope or a log line instead.

use std::io;

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    /// The frame was valid JSON but not an envelope a handler can work with.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
}
