//! Toon Bridge - HTTP surface of the schema-driven gateway
//!
//! Serves one route per schema action and republishes every invocation to
//! server-sent event and WebSocket observers.

#![forbid(unsafe_code)]

pub mod api;
pub mod cli;
pub mod middleware;
pub mod server;
pub mod websocket;

pub use server::{build_app, AppState};
