//! The `heartbeat` module runs the periodic server status broadcast.

pub mod scheduler;

pub use scheduler::{HEARTBEAT_MESSAGE, HeartbeatHandle, HeartbeatScheduler};
