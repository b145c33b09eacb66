//! Health check endpoint.
//!
//! `/health` reports liveness plus a summary of the loaded schema.

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::server::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub schema: SchemaSummary,
}

/// Counts describing the served schema
#[derive(Debug, Serialize)]
pub struct SchemaSummary {
    pub name: String,
    pub version: String,
    pub actions: usize,
    pub flows: usize,
}

async fn health_check(Extension(state): Extension<AppState>) -> Json<HealthResponse> {
    let schema = &state.schema.schema;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        schema: SchemaSummary {
            name: schema.name.clone(),
            version: schema.version.clone(),
            actions: schema.actions.len(),
            flows: schema.flow_count(),
        },
    })
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}
