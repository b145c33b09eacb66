//! `/schema`: the loaded schema verbatim, plus where it came from.

use axum::extract::Extension;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use toon_core::schema::{AgentSchema, SchemaSource};

use crate::server::AppState;

#[derive(Serialize)]
struct SchemaResponse<'a> {
    #[serde(flatten)]
    schema: &'a AgentSchema,
    source: &'a SchemaSource,
}

async fn get_schema(Extension(state): Extension<AppState>) -> Response {
    Json(SchemaResponse {
        schema: &state.schema.schema,
        source: &state.schema.source,
    })
    .into_response()
}

/// Create schema routes
pub fn schema_routes() -> Router {
    Router::new().route("/schema", get(get_schema))
}
