//! WebSocket module
//!
//! Provides the bidirectional push endpoint:
//! - /ws - Event stream WebSocket with subscription control

pub mod events;

pub use events::events_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new().route("/ws", get(events_handler))
}
