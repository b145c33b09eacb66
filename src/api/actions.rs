//! Dynamic action routes.
//!
//! Every schema action becomes one route at its endpoint and method. The
//! handler merges query, body and path parameters (path wins) and runs the
//! invocation pipeline, so each call shows up on the event bus.

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use toon_core::schema::{to_route_path, ActionDescriptor, AgentSchema, HttpMethod};
use toon_core::{merge_parameters, Parameters};
use tracing::debug;

use crate::server::AppState;

/// Error body for failed actions and rejected requests
#[derive(Debug, Serialize)]
pub struct ActionErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ActionErrorResponse { error: error.into() })).into_response()
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Head => MethodFilter::HEAD,
        HttpMethod::Options => MethodFilter::OPTIONS,
    }
}

/// Build the router serving every action in `schema`.
///
/// Actions sharing an endpoint are registered on one method router; the
/// schema validator guarantees no (endpoint, method) pair repeats.
pub fn action_routes(schema: &AgentSchema) -> Router {
    let mut routes: BTreeMap<String, MethodRouter> = BTreeMap::new();

    for action in &schema.actions {
        let descriptor = Arc::new(ActionDescriptor::from_action(
            action,
            schema.base_url.as_deref(),
        ));
        let handler = move |Extension(state): Extension<AppState>,
                            path: Option<Path<HashMap<String, String>>>,
                            query: Option<Query<HashMap<String, String>>>,
                            body: Bytes| {
            let descriptor = descriptor.clone();
            async move { invoke_action(state, &descriptor, path, query, body).await }
        };

        let route = to_route_path(&action.endpoint);
        debug!(action = %action.id, method = %action.method, route = %route, "Registering action route");
        let method_router = routes.remove(&route).unwrap_or_else(MethodRouter::new);
        routes.insert(route, method_router.on(method_filter(action.method), handler));
    }

    routes
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            router.route(&path, method_router)
        })
}

async fn invoke_action(
    state: AppState,
    descriptor: &ActionDescriptor,
    path: Option<Path<HashMap<String, String>>>,
    query: Option<Query<HashMap<String, String>>>,
    body: Bytes,
) -> Response {
    let body_params = match parse_body(&body) {
        Ok(params) => params,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let parameters = merge_parameters(
        string_params(query.map(|Query(q)| q)),
        body_params,
        string_params(path.map(|Path(p)| p)),
    );

    let result = state.pipeline.invoke(descriptor, parameters).await;
    match result.outcome {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(error) => error_response(StatusCode::INTERNAL_SERVER_ERROR, error),
    }
}

fn string_params(values: Option<HashMap<String, String>>) -> Parameters {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

/// Request body as parameters: empty or `null` means none, otherwise it must
/// be a JSON object.
fn parse_body(body: &[u8]) -> Result<Parameters, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Parameters::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Parameters::new()),
        Ok(_) => Err("request body must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON body: {}", e)),
    }
}
