//! Server configuration types
//!
//! Mirrors `config/default.toml`; every section falls back to its defaults.

use crate::middleware::auth::AuthSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toon_core::SessionConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Where the schema comes from; a CLI argument takes precedence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub source: Option<String>,
}

/// Cross-origin settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Allowed origins; empty means any
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Push delivery settings (`[events]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

fn default_queue_capacity() -> usize {
    toon_core::session::DEFAULT_QUEUE_CAPACITY
}

fn default_heartbeat_interval_secs() -> u64 {
    toon_core::session::DEFAULT_HEARTBEAT_INTERVAL.as_secs()
}

impl EventsConfig {
    /// Session settings for every push connection
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_queue_capacity(self.queue_capacity)
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval_secs.max(1)))
    }
}

/// Which executor performs actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorMode {
    /// Echo the call without leaving the process
    #[default]
    Mock,
    /// Forward to the schema's base URL
    Http,
}

/// Executor settings (`[executor]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub mode: ExecutorMode,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::Mock,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    toon_core::invocation::DEFAULT_UPSTREAM_TIMEOUT_SECS
}
