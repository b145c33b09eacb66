//! Events WebSocket handler
//!
//! Pushes every bus event to the client as a JSON text frame. Connections
//! start with every kind delivered; `subscribe` / `unsubscribe` requests
//! widen or narrow that set. Heartbeats are sent on idle regardless.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use toon_core::{EventKind, PushSession, ServerFrame};
use tracing::{debug, info, warn};

use crate::server::AppState;

mod types;

pub use types::SubscriptionRequest;

/// WebSocket upgrade handler
pub async fn events_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(value).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut session = PushSession::open(&state.bus, &state.sessions, state.shutdown.token());
    let session_id = session.id();
    info!(session_id = %session_id, "WebSocket events connection established");

    let (mut sender, mut receiver) = socket.split();

    if send_json(&mut sender, &ServerFrame::connected(session_id))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            // Client messages
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(session_id = %session_id, "Received control message: {}", text);
                        let reply = handle_client_message(&text, &mut session);
                        if send_json(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(session_id = %session_id, "WebSocket events connection closed by client");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
            // Queued bus events and heartbeats
            event = session.next_event() => {
                match event {
                    Some(event) => {
                        if send_json(&mut sender, event.as_ref()).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    info!(
        session_id = %session_id,
        dropped = session.dropped(),
        "WebSocket events connection ended"
    );
}

/// Parse and apply one client text frame, returning the reply.
fn handle_client_message(text: &str, session: &mut PushSession) -> ServerFrame {
    match serde_json::from_str::<SubscriptionRequest>(text) {
        Ok(request) => handle_subscription_request(request, session),
        Err(e) => ServerFrame::Error {
            message: format!("Invalid message format: {}", e),
            code: Some("INVALID_MESSAGE".to_string()),
        },
    }
}

/// Handle subscription request
fn handle_subscription_request(
    request: SubscriptionRequest,
    session: &mut PushSession,
) -> ServerFrame {
    match request {
        SubscriptionRequest::Subscribe { events } => {
            let mut kinds = session.interest().to_vec();
            kinds.extend(events);
            session.set_interest(&kinds);
            ServerFrame::Subscribed {
                events: session.interest().to_vec(),
            }
        }
        SubscriptionRequest::Unsubscribe { events } => {
            let kinds: Vec<EventKind> = session
                .interest()
                .iter()
                .copied()
                .filter(|k| !events.contains(k))
                .collect();
            session.set_interest(&kinds);
            ServerFrame::Subscribed {
                events: session.interest().to_vec(),
            }
        }
        SubscriptionRequest::Ping => ServerFrame::Pong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use toon_core::{EventBus, SessionConfig};

    fn open_session(bus: &Arc<EventBus>) -> PushSession {
        PushSession::open(bus, &SessionConfig::default(), CancellationToken::new())
    }

    #[test]
    fn test_ping_gets_pong() {
        let bus = Arc::new(EventBus::new());
        let mut session = open_session(&bus);
        assert_eq!(
            handle_client_message(r#"{"type":"ping"}"#, &mut session),
            ServerFrame::Pong
        );
    }

    #[test]
    fn test_unsubscribe_then_subscribe() {
        let bus = Arc::new(EventBus::new());
        let mut session = open_session(&bus);

        let reply = handle_client_message(
            r#"{"type":"unsubscribe","events":["state_updated","error"]}"#,
            &mut session,
        );
        match reply {
            ServerFrame::Subscribed { events } => {
                assert!(!events.contains(&EventKind::StateUpdated));
                assert!(!events.contains(&EventKind::Error));
                assert!(events.contains(&EventKind::ActionStarted));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(bus.subscriber_count(EventKind::StateUpdated), 0);

        handle_client_message(r#"{"type":"subscribe","events":["error"]}"#, &mut session);
        assert_eq!(bus.subscriber_count(EventKind::Error), 1);
        assert_eq!(bus.subscriber_count(EventKind::StateUpdated), 0);
    }

    #[test]
    fn test_legacy_kind_names_accepted() {
        let bus = Arc::new(EventBus::new());
        let mut session = open_session(&bus);

        let reply = handle_client_message(
            r#"{"type":"unsubscribe","events":["ACTION_START"]}"#,
            &mut session,
        );
        match reply {
            ServerFrame::Subscribed { events } => {
                assert!(!events.contains(&EventKind::ActionStarted));
                assert_eq!(events.len(), EventKind::ALL.len() - 1);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(bus.subscriber_count(EventKind::ActionStarted), 0);
    }

    #[test]
    fn test_invalid_message_reports_error() {
        let bus = Arc::new(EventBus::new());
        let mut session = open_session(&bus);

        for text in ["not json", r#"{"type":"explode"}"#, r#"{"type":"subscribe","events":["nope"]}"#] {
            match handle_client_message(text, &mut session) {
                ServerFrame::Error { code, .. } => {
                    assert_eq!(code.as_deref(), Some("INVALID_MESSAGE"));
                }
                other => panic!("unexpected reply: {:?}", other),
            }
        }
        assert_eq!(session.interest().len(), EventKind::ALL.len());
    }
}
