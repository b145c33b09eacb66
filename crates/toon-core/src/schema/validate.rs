//! Structural checks applied to every normalized schema.

use super::types::{AgentSchema, HttpMethod};
use crate::error::SchemaError;
use std::collections::{HashMap, HashSet};

/// Paths served by the gateway itself; actions may not claim them.
pub const RESERVED_PATHS: [&str; 4] = ["/health", "/schema", "/events", "/ws"];

/// Convert an endpoint template (`/users/{id}`) into router syntax (`/users/:id`).
pub fn to_route_path(endpoint: &str) -> String {
    endpoint
        .split('/')
        .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => format!(":{}", name),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Template with parameter names erased, so `/a/{x}` and `/a/{y}` compare equal.
fn route_shape(endpoint: &str) -> String {
    endpoint
        .split('/')
        .map(|segment| if segment.starts_with('{') && segment.ends_with('}') { "{}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check every segment of an endpoint template against the router's syntax.
///
/// Parameters must be whole `{name}` segments with a plain name. Literal
/// segments may not contain `:` or `*` (capture and wildcard markers) or
/// stray braces.
fn validate_segments(action_id: &str, endpoint: &str) -> Result<(), SchemaError> {
    let invalid = |reason: &str| {
        SchemaError::Validation(format!(
            "action '{}': endpoint '{}' {}",
            action_id, endpoint, reason
        ))
    };

    for segment in endpoint.split('/') {
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some("") => return Err(invalid("has an unnamed path parameter")),
            Some(name) if name.contains(|c: char| matches!(c, '{' | '}' | ':' | '*')) => {
                return Err(invalid(&format!("has an invalid parameter name '{}'", name)));
            }
            Some(_) => {}
            None if segment.contains(|c: char| matches!(c, ':' | '*')) => {
                return Err(invalid(&format!(
                    "segment '{}' uses reserved route characters ':' or '*'",
                    segment
                )));
            }
            None if segment.contains(|c: char| matches!(c, '{' | '}')) => {
                return Err(invalid(&format!(
                    "segment '{}' is not a whole '{{name}}' parameter",
                    segment
                )));
            }
            None => {}
        }
    }
    Ok(())
}

/// Reject schemas the gateway cannot serve unambiguously.
pub fn validate_schema(schema: &AgentSchema) -> Result<(), SchemaError> {
    if let Some(base_url) = &schema.base_url {
        url::Url::parse(base_url).map_err(|e| {
            SchemaError::Validation(format!("baseUrl '{}' is not a valid URL: {}", base_url, e))
        })?;
    }

    let mut ids = HashSet::new();
    let mut routes: HashSet<(String, HttpMethod)> = HashSet::new();
    let mut shapes: HashMap<String, String> = HashMap::new();

    for action in &schema.actions {
        if action.id.is_empty() {
            return Err(SchemaError::Validation(format!(
                "action at '{} {}' has no id",
                action.method, action.endpoint
            )));
        }
        if !ids.insert(action.id.as_str()) {
            return Err(SchemaError::Validation(format!(
                "duplicate action id '{}'",
                action.id
            )));
        }
        if !action.endpoint.starts_with('/') {
            return Err(SchemaError::Validation(format!(
                "action '{}': endpoint '{}' must start with '/'",
                action.id, action.endpoint
            )));
        }
        validate_segments(&action.id, &action.endpoint)?;
        if RESERVED_PATHS.contains(&action.endpoint.as_str()) {
            return Err(SchemaError::Validation(format!(
                "action '{}': endpoint '{}' is reserved by the gateway",
                action.id, action.endpoint
            )));
        }

        let shape = route_shape(&action.endpoint);
        let existing = shapes
            .entry(shape.clone())
            .or_insert_with(|| action.endpoint.clone());
        if existing != &action.endpoint {
            return Err(SchemaError::Validation(format!(
                "action '{}': endpoint '{}' conflicts with '{}'",
                action.id, action.endpoint, existing
            )));
        }
        if !routes.insert((shape, action.method)) {
            return Err(SchemaError::Validation(format!(
                "action '{}': {} {} is declared more than once",
                action.id, action.method, action.endpoint
            )));
        }
    }

    for flow in schema.flows.iter().flatten() {
        for step in &flow.steps {
            if !ids.contains(step.action_id.as_str()) {
                return Err(SchemaError::Validation(format!(
                    "flow '{}' refers to unknown action '{}'",
                    flow.id, step.action_id
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{AgentAction, AgentFlow, AgentFlowStep};

    fn action(id: &str, method: HttpMethod, endpoint: &str) -> AgentAction {
        AgentAction {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            endpoint: endpoint.to_string(),
            method,
            parameters: Vec::new(),
            request_body: None,
            responses: None,
            tags: None,
            summary: None,
        }
    }

    fn schema(actions: Vec<AgentAction>) -> AgentSchema {
        AgentSchema {
            version: "1.0.0".to_string(),
            name: "test".to_string(),
            description: None,
            base_url: None,
            actions,
            flows: None,
            links: None,
            metadata: None,
        }
    }

    #[test]
    fn test_route_path_conversion() {
        assert_eq!(to_route_path("/users/{id}/posts/{postId}"), "/users/:id/posts/:postId");
        assert_eq!(to_route_path("/static"), "/static");
    }

    #[test]
    fn test_valid_schema_passes() {
        let s = schema(vec![
            action("list", HttpMethod::Get, "/users"),
            action("create", HttpMethod::Post, "/users"),
            action("get", HttpMethod::Get, "/users/{id}"),
        ]);
        assert!(validate_schema(&s).is_ok());
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let s = schema(vec![
            action("a", HttpMethod::Get, "/users/{id}"),
            action("b", HttpMethod::Get, "/users/{id}"),
        ]);
        assert!(validate_schema(&s).is_err());
    }

    #[test]
    fn test_conflicting_templates_rejected() {
        let s = schema(vec![
            action("a", HttpMethod::Get, "/users/{id}"),
            action("b", HttpMethod::Delete, "/users/{userId}"),
        ]);
        let err = validate_schema(&s).unwrap_err();
        assert!(err.to_string().contains("conflicts"));
    }

    #[test]
    fn test_reserved_path_rejected() {
        let s = schema(vec![action("h", HttpMethod::Get, "/health")]);
        assert!(validate_schema(&s).is_err());
    }

    #[test]
    fn test_relative_endpoint_rejected() {
        let s = schema(vec![action("r", HttpMethod::Get, "users")]);
        assert!(validate_schema(&s).is_err());
    }

    #[test]
    fn test_unnamed_parameter_rejected() {
        let s = schema(vec![action("u", HttpMethod::Get, "/users/{}")]);
        let err = validate_schema(&s).unwrap_err();
        assert!(err.to_string().contains("unnamed path parameter"));
    }

    #[test]
    fn test_router_capture_syntax_rejected() {
        for endpoint in ["/users/:id", "/files/*path", "/v1/models/{model}:generate", "/a/{x:y}"] {
            let s = schema(vec![action("c", HttpMethod::Get, endpoint)]);
            assert!(validate_schema(&s).is_err(), "{} should be rejected", endpoint);
        }
    }

    #[test]
    fn test_partial_brace_segment_rejected() {
        for endpoint in ["/users/{id", "/users/id}", "/users/pre{id}"] {
            let s = schema(vec![action("p", HttpMethod::Get, endpoint)]);
            assert!(validate_schema(&s).is_err(), "{} should be rejected", endpoint);
        }
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut s = schema(vec![]);
        s.base_url = Some("not a url".to_string());
        assert!(validate_schema(&s).is_err());
    }

    #[test]
    fn test_flow_with_unknown_action_rejected() {
        let mut s = schema(vec![action("a", HttpMethod::Get, "/a")]);
        s.flows = Some(vec![AgentFlow {
            id: "f".to_string(),
            name: "f".to_string(),
            description: None,
            steps: vec![AgentFlowStep {
                action_id: "missing".to_string(),
                condition: None,
                on_success: Vec::new(),
                on_error: Vec::new(),
                parameters: serde_json::Map::new(),
            }],
            triggers: Vec::new(),
        }]);
        assert!(validate_schema(&s).is_err());
    }
}
