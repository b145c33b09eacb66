//! Integration tests for Toon Bridge
//!
//! These tests drive the assembled router end to end:
//! - schema-derived action routes and the invocation pipeline
//! - /health and /schema
//! - the server-sent event stream
//! - the WebSocket event stream over a real listener
//! - request authentication

use async_trait::async_trait;
use axum::body::{Body, BodyDataStream};
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use toon_bridge::middleware::{AuthSettings, AuthType};
use toon_bridge::server::config::AppConfig;
use toon_bridge::{build_app, AppState};
use toon_core::schema::{parse_schema_str, ActionDescriptor};
use toon_core::{
    ActionExecutor, EventKind, EventPayload, ExecutionError, MockExecutor, Parameters,
    SessionConfig, SharedEvent, SharedHandler,
};

const AGENTS_JSON: &str = r#"{
    "name": "Test API",
    "version": "2.0.0",
    "actions": [
        {"id": "foo", "name": "Foo", "endpoint": "/foo", "method": "GET"},
        {"id": "fail", "name": "Fail", "endpoint": "/fail", "method": "GET"},
        {"id": "getUser", "name": "Get user", "endpoint": "/users/{id}", "method": "GET"},
        {"id": "createUser", "name": "Create user", "endpoint": "/users", "method": "POST"}
    ]
}"#;

/// `fail` raises "boom"; everything else returns `{result: "ok"}`.
struct ScriptedExecutor;

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        action: &ActionDescriptor,
        _parameters: &Parameters,
    ) -> Result<Value, ExecutionError> {
        if action.id == "fail" {
            Err(ExecutionError::failed("boom"))
        } else {
            Ok(json!({"result": "ok"}))
        }
    }
}

fn state_with(executor: Arc<dyn ActionExecutor>, sessions: SessionConfig) -> AppState {
    let schema = parse_schema_str(AGENTS_JSON, "agents.json").unwrap();
    AppState::new(schema, executor, sessions)
}

fn app(state: &AppState) -> Router {
    build_app(state.clone(), &AppConfig::default())
}

fn record(state: &AppState) -> Arc<Mutex<Vec<SharedEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let handler: SharedHandler = Arc::new(move |event: &SharedEvent| -> toon_core::Result<()> {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });
    state.bus.subscribe_all(handler);
    events
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Read stream chunks until `needle` has been seen.
async fn read_until(stream: &mut BodyDataStream, needle: &str) -> String {
    let mut seen = String::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = stream.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if seen.contains(needle) {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {:?}", needle));
    seen
}

// ============================================================================
// Health / Schema
// ============================================================================

#[tokio::test]
async fn test_health_reports_schema_summary() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());
    let response = app(&state).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(
        body["schema"],
        json!({"name": "Test API", "version": "2.0.0", "actions": 4, "flows": 0})
    );
}

#[tokio::test]
async fn test_schema_endpoint_includes_source() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());
    let response = app(&state).oneshot(get("/schema")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["name"], "Test API");
    assert_eq!(body["actions"].as_array().unwrap().len(), 4);
    assert_eq!(body["source"]["type"], "agents-json");
    assert_eq!(body["source"]["path"], "agents.json");
}

// ============================================================================
// Action routes
// ============================================================================

#[tokio::test]
async fn test_successful_action_publishes_lifecycle() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());
    let events = record(&state);

    let response = app(&state).oneshot(get("/foo?q=1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"result": "ok"}));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind(), EventKind::ActionStarted);
    assert_eq!(events[1].kind(), EventKind::ActionEnded);

    let started = serde_json::to_value(events[0].as_ref()).unwrap();
    assert_eq!(started["parameters"], json!({"q": "1"}));
    assert_eq!(started["endpoint"], "/foo");

    let ended = serde_json::to_value(events[1].as_ref()).unwrap();
    assert_eq!(ended["success"], true);
    assert_eq!(ended["response"], json!({"result": "ok"}));
    assert_eq!(ended["statusCode"], 200);
    assert_eq!(ended["actionId"], started["actionId"]);
}

#[tokio::test]
async fn test_failed_action_returns_500() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());
    let events = record(&state);

    let response = app(&state).oneshot(get("/fail")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await, json!({"error": "boom"}));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    match events[1].payload() {
        EventPayload::ActionEnded { success, error, .. } => {
            assert!(!*success);
            assert_eq!(error.as_deref(), Some("boom"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_path_parameters_take_precedence_over_query() {
    let state = state_with(Arc::new(MockExecutor), SessionConfig::default());
    let response = app(&state).oneshot(get("/users/7?id=9&expand=true")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["action"], "getUser");
    assert_eq!(body["parameters"], json!({"id": "7", "expand": "true"}));
}

#[tokio::test]
async fn test_json_body_is_merged() {
    let state = state_with(Arc::new(MockExecutor), SessionConfig::default());
    let request = Request::builder()
        .method("POST")
        .uri("/users?source=test")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name": "Ada"}"#))
        .unwrap();

    let response = app(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["parameters"], json!({"name": "Ada", "source": "test"}));
}

#[tokio::test]
async fn test_non_object_body_is_rejected() {
    let state = state_with(Arc::new(MockExecutor), SessionConfig::default());
    let events = record(&state);
    let request = Request::builder()
        .method("POST")
        .uri("/users")
        .body(Body::from("[1, 2, 3]"))
        .unwrap();

    let response = app(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_method_is_not_routed() {
    let state = state_with(Arc::new(MockExecutor), SessionConfig::default());
    let request = Request::builder()
        .method("DELETE")
        .uri("/foo")
        .body(Body::empty())
        .unwrap();

    let response = app(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = app(&state).oneshot(get("/nowhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Server-sent events
// ============================================================================

#[tokio::test]
async fn test_event_stream_delivers_invocations() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());

    let response = app(&state).oneshot(get("/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers()["x-accel-buffering"], "no");

    let mut stream = response.into_body().into_data_stream();
    let first = read_until(&mut stream, "\n\n").await;
    assert!(first.starts_with("data: "));
    assert!(first.contains(r#""type":"connected""#));

    app(&state).oneshot(get("/foo?q=1")).await.unwrap();

    let seen = read_until(&mut stream, r#""type":"action_ended""#).await;
    let started = seen.find(r#""type":"action_started""#).unwrap();
    let ended = seen.find(r#""type":"action_ended""#).unwrap();
    assert!(started < ended);
}

#[tokio::test]
async fn test_idle_event_stream_sends_heartbeats() {
    let sessions = SessionConfig::default().with_heartbeat_interval(Duration::from_millis(50));
    let state = state_with(Arc::new(ScriptedExecutor), sessions);
    let events = record(&state);

    let response = app(&state).oneshot(get("/events")).await.unwrap();
    let mut stream = response.into_body().into_data_stream();

    read_until(&mut stream, r#""type":"connected""#).await;
    let first = read_until(&mut stream, r#""type":"heartbeat""#).await;
    let second = read_until(&mut stream, r#""type":"heartbeat""#).await;

    let id_of = |frame: &str| -> String {
        let line = frame
            .lines()
            .find(|l| l.contains("heartbeat"))
            .unwrap()
            .trim_start_matches("data: ")
            .to_string();
        serde_json::from_str::<Value>(&line).unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    };
    assert_ne!(id_of(&first), id_of(&second));

    // Heartbeats are per connection, never published on the bus
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_event_stream_ends_on_shutdown() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());

    let response = app(&state).oneshot(get("/events")).await.unwrap();
    let mut stream = response.into_body().into_data_stream();
    read_until(&mut stream, r#""type":"connected""#).await;
    assert_eq!(state.bus.subscriber_count(EventKind::ActionStarted), 1);

    state.shutdown.shutdown();

    let end = tokio::time::timeout(Duration::from_secs(5), async {
        while stream.next().await.is_some() {}
    })
    .await;
    assert!(end.is_ok());

    drop(stream);
    assert_eq!(state.bus.subscriber_count(EventKind::ActionStarted), 0);
}

#[tokio::test]
async fn test_disconnect_releases_subscription() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());

    let response = app(&state).oneshot(get("/events")).await.unwrap();
    assert_eq!(state.bus.subscriber_count(EventKind::ActionEnded), 1);

    drop(response);
    assert_eq!(state.bus.subscriber_count(EventKind::ActionEnded), 0);

    // Invocations still succeed with nobody listening
    let response = app(&state).oneshot(get("/foo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// WebSocket events
// ============================================================================

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve the app on an ephemeral port.
async fn serve(state: &AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect_ws(addr: SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

/// Next JSON text frame, skipping transport-level ping/pong.
async fn next_json(ws: &mut WsClient) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                other => panic!("unexpected socket frame: {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for a socket frame")
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(WsMessage::Text(value.to_string())).await.unwrap();
}

/// Wait until no session is registered on the bus.
async fn wait_for_release(state: &AppState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while EventKind::ALL
            .iter()
            .any(|kind| state.bus.subscriber_count(*kind) > 0)
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session still registered on the bus");
}

#[tokio::test]
async fn test_websocket_pushes_events_in_order() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());
    let addr = serve(&state).await;
    let mut ws = connect_ws(addr).await;

    let connected = next_json(&mut ws).await;
    assert_eq!(connected["type"], "connected");
    assert!(connected["sessionId"].is_string());
    for kind in EventKind::ALL {
        assert_eq!(state.bus.subscriber_count(kind), 1);
    }

    let response = app(&state).oneshot(get("/foo?q=1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let started = next_json(&mut ws).await;
    let ended = next_json(&mut ws).await;
    assert_eq!(started["type"], "action_started");
    assert_eq!(ended["type"], "action_ended");
    for frame in [&started, &ended] {
        assert!(frame["id"].is_string());
        assert!(frame["timestamp"].as_i64().unwrap() > 0);
    }
    assert_eq!(started["actionId"], ended["actionId"]);
    assert_eq!(ended["statusCode"], 200);

    ws.close(None).await.unwrap();
    wait_for_release(&state).await;
}

#[tokio::test]
async fn test_websocket_unsubscribe_with_legacy_name() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());
    let addr = serve(&state).await;
    let mut ws = connect_ws(addr).await;
    next_json(&mut ws).await;

    send_json(&mut ws, json!({"type": "unsubscribe", "events": ["ACTION_START"]})).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "subscribed");
    assert!(!reply["events"]
        .as_array()
        .unwrap()
        .contains(&json!("action_started")));

    app(&state).oneshot(get("/foo")).await.unwrap();
    assert_eq!(next_json(&mut ws).await["type"], "action_ended");
}

#[tokio::test]
async fn test_websocket_heartbeat_despite_client_chatter() {
    let sessions = SessionConfig::default().with_heartbeat_interval(Duration::from_millis(150));
    let state = state_with(Arc::new(ScriptedExecutor), sessions);
    let addr = serve(&state).await;
    let mut ws = connect_ws(addr).await;
    next_json(&mut ws).await;

    // Ping faster than the heartbeat interval; a heartbeat must still arrive.
    let mut saw_heartbeat = false;
    for _ in 0..40 {
        send_json(&mut ws, json!({"type": "ping"})).await;
        match next_json(&mut ws).await["type"].as_str() {
            Some("heartbeat") => {
                saw_heartbeat = true;
                break;
            }
            Some("pong") => tokio::time::sleep(Duration::from_millis(40)).await,
            other => panic!("unexpected frame type: {:?}", other),
        }
    }
    assert!(saw_heartbeat);
}

#[tokio::test]
async fn test_websocket_closed_on_shutdown() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());
    let addr = serve(&state).await;
    let mut ws = connect_ws(addr).await;
    next_json(&mut ws).await;

    state.shutdown.shutdown();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Close(_))) => return true,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return false,
            }
        }
    })
    .await
    .unwrap();
    assert!(closed);
    wait_for_release(&state).await;
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_api_key_auth() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());
    let config = AppConfig {
        auth: AuthSettings {
            auth_type: AuthType::ApiKey,
            api_key: Some("letmein".to_string()),
            ..AuthSettings::default()
        },
        ..AppConfig::default()
    };
    let app = build_app(state.clone(), &config);

    let response = app.clone().oneshot(get("/foo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Unauthorized: Invalid API key"})
    );

    let request = Request::builder()
        .uri("/foo")
        .header("x-api-key", "letmein")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bearer_auth_guards_event_stream() {
    let state = state_with(Arc::new(ScriptedExecutor), SessionConfig::default());
    let config = AppConfig {
        auth: AuthSettings {
            auth_type: AuthType::Bearer,
            bearer_token: Some("t0k3n".to_string()),
            ..AuthSettings::default()
        },
        ..AppConfig::default()
    };
    let app = build_app(state.clone(), &config);

    let response = app.clone().oneshot(get("/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.bus.subscriber_count(EventKind::ActionStarted), 0);

    let request = Request::builder()
        .uri("/events")
        .header("authorization", "Bearer t0k3n")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
