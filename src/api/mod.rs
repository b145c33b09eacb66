//! REST API module
//!
//! Provides HTTP endpoints:
//! - `/health` - liveness and schema summary
//! - `/schema` - the loaded schema and its source
//! - `/events` - server-sent event stream
//! - one route per schema action

pub mod actions;
pub mod events;
pub mod health;
pub mod schema;

pub use actions::action_routes;
pub use events::events_routes;
pub use health::health_routes;
pub use schema::schema_routes;
