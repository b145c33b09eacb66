//! Middleware module for the gateway HTTP server
//!
//! Provides:
//! - Authentication layer (API key / Bearer / Basic)

pub mod auth;

pub use auth::{AuthLayer, AuthSettings, AuthType};
