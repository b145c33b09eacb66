//! Action executors - the collaborator that actually performs an action.

use crate::error::ExecutionError;
use crate::event_bus::Parameters;
use crate::schema::{ActionDescriptor, HttpMethod};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Default upstream timeout in seconds
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Maximum length of an upstream error body kept in the error message
const MAX_ERROR_BODY_LEN: usize = 512;

/// Performs the backend call behind an action.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute `action` with the merged request parameters.
    async fn execute(
        &self,
        action: &ActionDescriptor,
        parameters: &Parameters,
    ) -> Result<Value, ExecutionError>;
}

/// Executor that never leaves the process: echoes what it would have called.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor;

#[async_trait]
impl ActionExecutor for MockExecutor {
    async fn execute(
        &self,
        action: &ActionDescriptor,
        parameters: &Parameters,
    ) -> Result<Value, ExecutionError> {
        Ok(json!({
            "action": action.id,
            "endpoint": action.endpoint,
            "method": action.method,
            "parameters": parameters,
            "message": "This is a mock response. In production, this would call the actual backend.",
        }))
    }
}

/// Pass-through executor that forwards the call to the action's base URL.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    /// Create an executor with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

/// Substitute `{name}` segments from `parameters`, removing the ones used.
///
/// Returns the concrete path and the parameters left over.
pub fn expand_endpoint(
    endpoint: &str,
    parameters: &Parameters,
) -> Result<(String, Parameters), ExecutionError> {
    let mut remaining = parameters.clone();
    let mut segments = Vec::new();

    for segment in endpoint.split('/') {
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => {
                let value = remaining.remove(name).ok_or_else(|| {
                    ExecutionError::InvalidAction(format!("missing path parameter '{}'", name))
                })?;
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                segments.push(text);
            }
            None => segments.push(segment.to_string()),
        }
    }

    Ok((segments.join("/"), remaining))
}

fn query_pairs(parameters: &Parameters) -> Vec<(String, String)> {
    parameters
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

#[async_trait]
impl ActionExecutor for HttpExecutor {
    async fn execute(
        &self,
        action: &ActionDescriptor,
        parameters: &Parameters,
    ) -> Result<Value, ExecutionError> {
        let base_url = action.base_url.as_deref().ok_or_else(|| {
            ExecutionError::InvalidAction(format!("action '{}' has no base URL", action.id))
        })?;

        let (path, remaining) = expand_endpoint(&action.endpoint, parameters)?;
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        debug!(action_id = %action.id, method = %action.method, url = %url, "Forwarding action upstream");

        let mut request = self.client.request(to_reqwest_method(action.method), &url);
        request = if action.method.sends_body() {
            request.json(&remaining)
        } else {
            request.query(&query_pairs(&remaining))
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let body: String = text.chars().take(MAX_ERROR_BODY_LEN).collect();
            return Err(ExecutionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
