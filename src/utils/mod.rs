//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `wsrelay` application.
//!
//! It centralizes the crate-wide error type and the logging setup so every
//! other module reports failures and events the same way.

pub mod error;
pub mod logging;

pub use error::RelayError;
