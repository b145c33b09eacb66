//! Toon Core - event and invocation engine for the schema-driven gateway
//!
//! This crate provides everything behind the HTTP surface:
//! - Event bus: typed publish/subscribe with per-handler fault isolation
//! - Push sessions: bounded per-connection queues with idle heartbeats
//! - Invocation: action lifecycle events around a pluggable executor
//! - Schema: OpenAPI / agents.json loading, normalization and validation
//! - Shutdown: cancellation shared by long-lived push streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event_bus;
pub mod invocation;
pub mod schema;
pub mod session;
pub mod shutdown;

pub use error::{Error, ExecutionError, Result, SchemaError};
pub use event_bus::{
    Event, EventBus, EventHandler, EventKind, EventPayload, Parameters, ServerFrame, SharedEvent,
    SharedHandler, Subscription,
};
pub use invocation::{
    merge_parameters, ActionExecutor, HttpExecutor, InvocationPipeline, InvocationResult,
    MockExecutor,
};
pub use schema::{
    ActionDescriptor, AgentSchema, DefaultSchemaLoader, HttpMethod, NormalizedSchema,
    SchemaLoader,
};
pub use session::{PushSession, SessionConfig};

// Re-export shutdown module types
pub use shutdown::{shutdown_signal_with_controller, wait_for_shutdown_signal, ShutdownController};
