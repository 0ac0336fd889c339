//! Shared utilities and error types

pub mod error;
pub mod logging;

pub use error::{BridgeError, Result};
