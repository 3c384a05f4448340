//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `live` - Duplex voice bridge WebSocket

pub mod api;
pub mod live;

pub use live::live_handler;
