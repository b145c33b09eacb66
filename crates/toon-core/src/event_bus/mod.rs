//! EventBus - synchronous publish/subscribe core for gateway events.
//!
//! Producers (the invocation pipeline) publish; push sessions register
//! handlers per [`EventKind`]. One failing handler never affects the producer
//! or the other handlers.

/// Core bus implementation (handler registry + dispatch).
pub mod bus;
/// Scoped handler registration.
pub mod subscription;
/// Event model: kinds, payloads, envelope and control frames.
pub mod types;

pub use bus::{EventBus, EventHandler, SharedHandler};
pub use subscription::Subscription;
pub use types::{
    now_millis, Event, EventKind, EventPayload, MessageRole, Parameters, ServerFrame,
    SharedEvent, UnknownEventKind,
};
