//! # Osrbridge - Off-Screen Rendering Bridge
//!
//! Connects an embedded web engine that renders pages into CPU buffers with
//! a host that draws a GPU texture every frame.
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - **geometry**: Rectangles, view size, popup placement and screen mapping
//! - **mailbox**: Coalescing dirty-region handoff between threads
//! - **compositor**: Composites base and popup paints into one frame
//! - **texture**: Keeps a GPU texture in step with the frame (wgpu or memory)
//! - **client**: Lifecycle state machine and engine callbacks
//! - **security**: Host interface access policy
//! - **config**: Client configuration
//! - **utils**: Shared error types and logger setup

pub mod client;
pub mod compositor;
pub mod config;
pub mod geometry;
pub mod mailbox;
pub mod security;
pub mod texture;
pub mod utils;

// Re-export main types for convenience
pub use client::{ClientState, RenderClient, RenderHandler, WebEngine};
pub use config::ClientConfig;
pub use geometry::Rect;
pub use utils::error::{BridgeError, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Osrbridge";

/// Default sizes and limits
pub mod defaults {
    /// View width used when the host gives none
    pub const VIEW_WIDTH: u32 = 1280;
    /// View height used when the host gives none
    pub const VIEW_HEIGHT: u32 = 720;
    /// Bytes per BGRA8 pixel
    pub const BYTES_PER_PIXEL: usize = 4;
    /// Largest texture edge accepted
    pub const MAX_TEXTURE_DIMENSION: u32 = 8192;
}
