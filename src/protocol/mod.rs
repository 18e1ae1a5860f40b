//! The `protocol` module defines the wire protocol spoken between peers and
//! the relay.
//!
//! Every frame is a UTF-8 JSON object with a string `type` field. `message`
//! holds the typed envelopes in both directions and `codec` converts between
//! them and text frames.

pub mod codec;
pub mod message;

pub use codec::{DecodeError, decode, decode_bytes, encode, to_frame};
pub use message::{
    ClientMessage, SUPPORTED_TYPES, ServerInfo, ServerMessage, ServerStats, Stats, timestamp,
};
