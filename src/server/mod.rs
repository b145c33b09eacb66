//! Server module
//!
//! Contains the server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `state`: Request state shared by every handler
//! - `init`: Router construction and the run loop

pub mod config;
mod init;
mod loader;
mod state;

// Re-export public API
pub use init::{build_app, build_executor, run};
pub use loader::load_config;
pub use state::AppState;
