//! The `router` module maps inbound envelopes onto handlers.

pub mod dispatch;

pub use dispatch::{BROADCAST_CONFIRM_MESSAGE, MessageRouter, WELCOME_MESSAGE};
