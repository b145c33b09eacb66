//! Server initialization
//!
//! Loads the schema, wires executor, bus and push endpoints into one router,
//! and serves it until Ctrl+C / SIGTERM.

use super::config::{AppConfig, CorsConfig, ExecutorConfig, ExecutorMode};
use super::state::AppState;
use crate::middleware::auth::AuthLayer;
use anyhow::{Context, Result};
use axum::{http::HeaderValue, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use toon_core::{
    shutdown_signal_with_controller, ActionExecutor, DefaultSchemaLoader, HttpExecutor,
    MockExecutor, SchemaLoader,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the full router for `state`.
pub fn build_app(state: AppState, config: &AppConfig) -> Router {
    let app = Router::new()
        .merge(crate::api::health_routes())
        .merge(crate::api::schema_routes())
        // Push endpoints
        .merge(crate::api::events_routes())
        .merge(crate::websocket::websocket_router())
        // One route per schema action
        .merge(crate::api::action_routes(&state.schema.schema))
        .layer(Extension(state))
        .layer(AuthLayer::new(&config.auth));

    let app = if config.cors.enabled {
        app.layer(cors_layer(&config.cors))
    } else {
        app
    };

    app.layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Executor selected by `[executor] mode`
pub fn build_executor(config: &ExecutorConfig) -> Result<Arc<dyn ActionExecutor>> {
    match config.mode {
        ExecutorMode::Mock => Ok(Arc::new(MockExecutor)),
        ExecutorMode::Http => {
            let executor = HttpExecutor::new(Duration::from_secs(config.timeout_secs))
                .context("Failed to build HTTP executor")?;
            Ok(Arc::new(executor))
        }
    }
}

/// Load the schema and serve until shutdown.
pub async fn run(config: AppConfig) -> Result<()> {
    let source = config
        .schema
        .source
        .clone()
        .context("No schema given. Pass a path or URL, or set [schema] source")?;

    config
        .auth
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid [auth] configuration")?;

    let schema = DefaultSchemaLoader::new()
        .load(&source)
        .await
        .with_context(|| format!("Failed to load schema from {}", source))?;

    if config.executor.mode == ExecutorMode::Http && schema.schema.base_url.is_none() {
        warn!("HTTP executor selected but the schema has no baseUrl; actions will fail");
    }

    let executor = build_executor(&config.executor)?;
    info!(mode = ?config.executor.mode, "Executor ready");

    let state = AppState::new(schema, executor, config.events.session_config());
    let shutdown = state.shutdown.clone();
    let actions = state.schema.schema.actions.len();
    let app = build_app(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("HTTP server listening on http://{}", addr);
    info!(
        actions,
        auth = ?config.auth.auth_type,
        cors = config.cors.enabled,
        "Serving /health, /schema, /events (SSE) and /ws (WebSocket)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_controller(shutdown))
        .await
        .context("HTTP server error")?;

    info!("Toon Bridge shutdown complete");
    Ok(())
}
