//! Server-sent events endpoint.
//!
//! `GET /events` streams every bus event as `data: <json>\n\n`, preceded by a
//! `connected` frame. Idle connections get a heartbeat each interval. The
//! stream ends when the client goes away or the server shuts down; either way
//! the session's bus registration is released.

use axum::extract::Extension;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use toon_core::{PushSession, ServerFrame};
use tracing::{info, warn};

use crate::server::AppState;

fn data_frame<T: Serialize>(value: &T) -> SseEvent {
    SseEvent::default().json_data(value).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to serialize push frame");
        SseEvent::default().comment("unserializable frame")
    })
}

/// Frames for one session: `connected`, then queued events and heartbeats.
fn session_stream(session: PushSession) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    let connected = data_frame(&ServerFrame::connected(session.id()));

    stream::once(async move { Ok(connected) }).chain(stream::unfold(
        session,
        |mut session| async move {
            let event = session.next_event().await?;
            Some((Ok(data_frame(event.as_ref())), session))
        },
    ))
}

async fn events_stream(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let session = PushSession::open(&state.bus, &state.sessions, state.shutdown.token());
    info!(session_id = %session.id(), "SSE client connected");

    (
        [("x-accel-buffering", "no")],
        Sse::new(session_stream(session)),
    )
}

/// Create the server-push route
pub fn events_routes() -> Router {
    Router::new().route("/events", get(events_stream))
}
