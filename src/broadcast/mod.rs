//! The `broadcast` module delivers one envelope to many connections.

pub mod engine;

pub use engine::{
    BroadcastEngine, BroadcastReport, Delivery, DeliveryError, SERVER_SENDER, deliver_to,
};

#[cfg(test)]
mod tests;
