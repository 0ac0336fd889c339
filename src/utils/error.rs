//! Error types for the rendering bridge

use crate::client::ClientState;
use crate::texture::GpuError;

/// Main error type for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// GPU resources could not be allocated or written
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// Non-positive view or paint dimensions
    #[error("Invalid geometry: {width}x{height}")]
    InvalidGeometry { width: i64, height: i64 },
    /// Paint buffer smaller than its stated dimensions
    #[error("Paint buffer too small: expected {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
    /// Operation called out of lifecycle order
    #[error("Cannot {operation} while client is {state}")]
    InvalidState {
        operation: &'static str,
        state: ClientState,
    },
    /// URL handed to the client did not parse
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The web engine refused a request
    #[error("Web engine error: {0}")]
    Engine(String),
    /// Configuration could not be used
    #[error("Configuration error: {0}")]
    Config(String),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
