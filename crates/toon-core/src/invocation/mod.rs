//! Action invocation pipeline.
//!
//! Wraps one action execution in an action-started / action-ended pair of
//! bus events sharing a correlation id.

pub mod executor;

pub use executor::{
    expand_endpoint, ActionExecutor, HttpExecutor, MockExecutor, DEFAULT_UPSTREAM_TIMEOUT_SECS,
};

use crate::event_bus::{now_millis, Event, EventBus, EventPayload, Parameters};
use crate::schema::ActionDescriptor;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Status reported for a successful invocation
pub const STATUS_OK: u16 = 200;

/// Status reported for a failed invocation
pub const STATUS_FAILED: u16 = 500;

/// Merge request parameter sources into one map.
///
/// Later sources win on key collision: query, then body, then path.
pub fn merge_parameters(query: Parameters, body: Parameters, path: Parameters) -> Parameters {
    let mut merged = query;
    merged.extend(body);
    merged.extend(path);
    merged
}

/// Outcome of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    /// Correlation id carried by both lifecycle events
    pub correlation_id: String,
    /// Wall time of the executor call
    pub duration_ms: u64,
    /// Executor result, or the failure message
    pub outcome: Result<Value, String>,
}

impl InvocationResult {
    /// Whether the executor succeeded
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// HTTP status the caller should see
    pub fn status_code(&self) -> u16 {
        if self.is_success() {
            STATUS_OK
        } else {
            STATUS_FAILED
        }
    }
}

/// Runs actions through an executor and reports their lifecycle on the bus.
#[derive(Clone)]
pub struct InvocationPipeline {
    bus: Arc<EventBus>,
    executor: Arc<dyn ActionExecutor>,
}

impl InvocationPipeline {
    /// Create a pipeline publishing to `bus`
    pub fn new(bus: Arc<EventBus>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self { bus, executor }
    }

    /// Bus lifecycle events are published to
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Invoke `action` with already merged `parameters`.
    ///
    /// Never fails: executor errors are captured in the result and reported
    /// as an unsuccessful action-ended event. Observer failures are contained
    /// by the bus and cannot stop the invocation.
    pub async fn invoke(&self, action: &ActionDescriptor, parameters: Parameters) -> InvocationResult {
        let correlation_id = format!("{}_{}", action.id, now_millis());

        self.bus.publish(Event::new(
            correlation_id.clone(),
            EventPayload::ActionStarted {
                action_id: correlation_id.clone(),
                action_name: action.name.clone(),
                endpoint: action.endpoint.clone(),
                method: action.method.to_string(),
                parameters: parameters.clone(),
            },
        ));
        debug!(action_id = %correlation_id, action = %action.id, "Action started");

        let started = Instant::now();
        let result = self.executor.execute(action, &parameters).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let end_id = format!("{}_end", correlation_id);
        let (payload, outcome) = match result {
            Ok(response) => {
                info!(action_id = %correlation_id, duration_ms, "Action succeeded");
                (
                    EventPayload::ActionEnded {
                        action_id: correlation_id.clone(),
                        response: Some(response.clone()),
                        error: None,
                        status_code: Some(STATUS_OK),
                        success: true,
                        duration_ms,
                    },
                    Ok(response),
                )
            }
            Err(e) => {
                let message = e.to_string();
                warn!(action_id = %correlation_id, duration_ms, error = %message, "Action failed");
                (
                    EventPayload::ActionEnded {
                        action_id: correlation_id.clone(),
                        response: None,
                        error: Some(message.clone()),
                        status_code: Some(STATUS_FAILED),
                        success: false,
                        duration_ms,
                    },
                    Err(message),
                )
            }
        };
        self.bus.publish(Event::new(end_id, payload));

        InvocationResult {
            correlation_id,
            duration_ms,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ExecutionError};
    use crate::event_bus::{EventKind, SharedEvent, SharedHandler};
    use crate::schema::HttpMethod;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedExecutor(Result<Value, String>);

    #[async_trait]
    impl ActionExecutor for FixedExecutor {
        async fn execute(
            &self,
            _action: &ActionDescriptor,
            _parameters: &Parameters,
        ) -> Result<Value, ExecutionError> {
            self.0.clone().map_err(ExecutionError::Failed)
        }
    }

    fn foo_action() -> ActionDescriptor {
        ActionDescriptor {
            id: "foo".to_string(),
            name: "Foo".to_string(),
            endpoint: "/foo".to_string(),
            method: HttpMethod::Get,
            base_url: None,
        }
    }

    fn recorder(bus: &Arc<EventBus>) -> Arc<Mutex<Vec<SharedEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let handler: SharedHandler = Arc::new(move |event: &SharedEvent| -> crate::Result<()> {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        bus.subscribe_all(handler);
        events
    }

    fn q1() -> Parameters {
        json!({"q": "1"}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_successful_invocation_publishes_start_then_end() {
        let bus = Arc::new(EventBus::new());
        let events = recorder(&bus);
        let pipeline = InvocationPipeline::new(
            bus.clone(),
            Arc::new(FixedExecutor(Ok(json!({"result": "ok"})))),
        );

        let result = pipeline.invoke(&foo_action(), q1()).await;
        assert_eq!(result.outcome, Ok(json!({"result": "ok"})));
        assert_eq!(result.status_code(), 200);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        match events[0].payload() {
            EventPayload::ActionStarted {
                action_id,
                endpoint,
                method,
                parameters,
                ..
            } => {
                assert_eq!(action_id, &result.correlation_id);
                assert_eq!(endpoint, "/foo");
                assert_eq!(method, "GET");
                assert_eq!(parameters, &q1());
            }
            other => panic!("unexpected first event: {:?}", other),
        }
        match events[1].payload() {
            EventPayload::ActionEnded {
                action_id,
                response,
                status_code,
                success,
                error,
                ..
            } => {
                assert_eq!(action_id, &result.correlation_id);
                assert!(*success);
                assert_eq!(response, &Some(json!({"result": "ok"})));
                assert_eq!(*status_code, Some(200));
                assert!(error.is_none());
            }
            other => panic!("unexpected second event: {:?}", other),
        }
        assert_eq!(events[1].id(), format!("{}_end", result.correlation_id));
    }

    #[tokio::test]
    async fn test_failed_invocation_reports_error() {
        let bus = Arc::new(EventBus::new());
        let events = recorder(&bus);
        let pipeline =
            InvocationPipeline::new(bus.clone(), Arc::new(FixedExecutor(Err("boom".to_string()))));

        let result = pipeline.invoke(&foo_action(), q1()).await;
        assert_eq!(result.outcome, Err("boom".to_string()));
        assert_eq!(result.status_code(), 500);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind(), EventKind::ActionEnded);
        match events[1].payload() {
            EventPayload::ActionEnded {
                success,
                error,
                response,
                ..
            } => {
                assert!(!*success);
                assert_eq!(error.as_deref(), Some("boom"));
                assert!(response.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failing_observer_does_not_stop_invocation() {
        let bus = Arc::new(EventBus::new());
        let broken: SharedHandler = Arc::new(|_: &SharedEvent| -> crate::Result<()> {
            Err(Error::Handler("observer down".to_string()))
        });
        bus.subscribe(EventKind::ActionStarted, broken);
        let events = recorder(&bus);

        let pipeline =
            InvocationPipeline::new(bus.clone(), Arc::new(FixedExecutor(Ok(json!(true)))));
        let result = pipeline.invoke(&foo_action(), Parameters::new()).await;

        assert!(result.is_success());
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_path_parameters_take_precedence() {
        let query = json!({"id": "from-query", "q": "1"}).as_object().cloned().unwrap();
        let body = json!({"id": "from-body", "name": "x"}).as_object().cloned().unwrap();
        let path = json!({"id": "from-path"}).as_object().cloned().unwrap();

        let merged = merge_parameters(query, body, path);
        assert_eq!(merged["id"], "from-path");
        assert_eq!(merged["q"], "1");
        assert_eq!(merged["name"], "x");
    }
}
