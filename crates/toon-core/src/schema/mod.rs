//! Schema model, normalization and loading.
//!
//! Two source dialects are accepted (OpenAPI 3 and agents.json, as JSON or
//! YAML, from a file or URL) and normalized into one [`AgentSchema`].

/// Acquisition from file or URL.
pub mod loader;
/// Dialect-specific normalization.
pub mod normalizer;
/// Normalized schema model.
pub mod types;
/// Structural validation.
pub mod validate;

pub use loader::{parse_schema_str, DefaultSchemaLoader, SchemaLoader};
pub use normalizer::{normalize_agents_json, normalize_document, normalize_openapi};
pub use types::{
    ActionDescriptor, AgentAction, AgentFlow, AgentFlowStep, AgentLink, AgentParameter,
    AgentSchema, HttpMethod, NormalizedSchema, RequestBodySpec, ResponseSpec, SchemaKind,
    SchemaSource,
};
pub use validate::{to_route_path, validate_schema, RESERVED_PATHS};
