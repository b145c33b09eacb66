//! Normalization of OpenAPI and agents.json documents into [`AgentSchema`].

use super::types::{
    AgentAction, AgentFlow, AgentFlowStep, AgentLink, AgentParameter, AgentSchema, HttpMethod,
    NormalizedSchema, RequestBodySpec, ResponseSpec, SchemaKind, SchemaSource,
};
use super::validate::validate_schema;
use crate::error::SchemaError;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// `$ref` chains deeper than this are left unresolved
const MAX_REF_DEPTH: usize = 32;

/// Normalize a parsed document, detecting its dialect.
///
/// Documents carrying an `openapi` (or `swagger`) key are treated as OpenAPI,
/// even when wrapped in agents.json; everything else as agents.json.
pub fn normalize_document(doc: &Value, source_path: &str) -> Result<NormalizedSchema, SchemaError> {
    if !doc.is_object() {
        return Err(SchemaError::Validation(
            "schema document must be an object".to_string(),
        ));
    }
    if doc.get("openapi").is_some() || doc.get("swagger").is_some() {
        normalize_openapi(doc, source_path)
    } else {
        normalize_agents_json(doc, source_path)
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn object_list<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|item| item.is_object())
}

fn parse_method(raw: Option<&str>, action_id: &str) -> Result<HttpMethod, SchemaError> {
    raw.unwrap_or("GET")
        .parse()
        .map_err(|e| SchemaError::Validation(format!("action '{}': {}", action_id, e)))
}

/// Inline local `$ref` pointers (`#/components/...`).
fn dereference(value: &Value, root: &Value, depth: usize) -> Value {
    if depth > MAX_REF_DEPTH {
        return value.clone();
    }
    match value {
        Value::Object(map) => {
            if let Some(target) = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix('#'))
                .and_then(|pointer| root.pointer(pointer))
            {
                return dereference(target, root, depth + 1);
            }
            Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), dereference(v, root, depth)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| dereference(item, root, depth))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn openapi_parameter(param: &Value) -> AgentParameter {
    let schema = param.get("schema").cloned().unwrap_or_else(|| json!({}));
    AgentParameter {
        name: str_field(param, "name").unwrap_or_default(),
        param_type: str_field(&schema, "type").unwrap_or_else(|| "string".to_string()),
        description: str_field(param, "description"),
        required: param.get("required").and_then(Value::as_bool).unwrap_or(false),
        schema: Some(schema),
        example: param.get("example").cloned(),
        default: None,
    }
}

fn openapi_request_body(op: &Value) -> Option<RequestBodySpec> {
    let content = op.get("requestBody")?.get("content").and_then(Value::as_object);
    let (content_type, media) = match content.and_then(|c| c.iter().next()) {
        Some((ct, media)) => (ct.clone(), media.clone()),
        None => ("application/json".to_string(), Value::Null),
    };
    Some(RequestBodySpec {
        content_type,
        schema: media.get("schema").cloned().unwrap_or_else(|| json!({})),
    })
}

fn openapi_responses(op: &Value) -> BTreeMap<String, ResponseSpec> {
    op.get("responses")
        .and_then(Value::as_object)
        .map(|responses| {
            responses
                .iter()
                .map(|(status, resp)| {
                    let schema = resp
                        .pointer("/content/application~1json/schema")
                        .cloned()
                        .unwrap_or_else(|| json!({}));
                    (
                        status.clone(),
                        ResponseSpec {
                            description: str_field(resp, "description"),
                            schema: Some(schema),
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Normalize an OpenAPI 3 document: every path/method pair becomes an action.
pub fn normalize_openapi(doc: &Value, source_path: &str) -> Result<NormalizedSchema, SchemaError> {
    let doc = dereference(doc, doc, 0);
    let mut actions = Vec::new();

    let empty = Map::new();
    let paths = doc.get("paths").and_then(Value::as_object).unwrap_or(&empty);

    for (path, path_item) in paths {
        let path_params: Vec<&Value> = path_item
            .get("parameters")
            .and_then(Value::as_array)
            .map(|p| p.iter().collect())
            .unwrap_or_default();

        for method in HttpMethod::ALL {
            let Some(op) = path_item.get(method.as_str().to_lowercase()) else {
                continue;
            };

            let id = non_empty(str_field(op, "operationId")).unwrap_or_else(|| {
                format!("{}_{}", method.as_str().to_lowercase(), path.replace('/', "_"))
            });
            let summary = non_empty(str_field(op, "summary"));

            let op_params = op
                .get("parameters")
                .and_then(Value::as_array)
                .into_iter()
                .flatten();
            let parameters = path_params
                .iter()
                .copied()
                .chain(op_params)
                .map(openapi_parameter)
                .collect();

            let tags = string_list(op, "tags");

            actions.push(AgentAction {
                name: summary.clone().unwrap_or_else(|| id.clone()),
                id,
                description: non_empty(str_field(op, "description")),
                endpoint: path.clone(),
                method,
                parameters,
                request_body: openapi_request_body(op),
                responses: Some(openapi_responses(op)),
                tags: (!tags.is_empty()).then_some(tags),
                summary,
            });
        }
    }

    let info = doc.get("info").cloned().unwrap_or(Value::Null);
    let version = str_field(&doc, "openapi")
        .or_else(|| str_field(&doc, "swagger"))
        .unwrap_or_else(|| "3.0.0".to_string());

    let schema = AgentSchema {
        version: version.clone(),
        name: str_field(&info, "title").unwrap_or_else(|| "API".to_string()),
        description: str_field(&info, "description"),
        base_url: doc
            .pointer("/servers/0/url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        actions,
        flows: None,
        links: None,
        metadata: Some(json!({
            "openapi": doc.get("openapi").cloned().unwrap_or(Value::Null),
            "info": info,
        })),
    };

    validate_schema(&schema)?;

    Ok(NormalizedSchema {
        schema,
        source: SchemaSource {
            kind: SchemaKind::OpenApi,
            path: source_path.to_string(),
            version: Some(version),
        },
    })
}

fn agents_parameter(p: &Value) -> AgentParameter {
    AgentParameter {
        name: str_field(p, "name").unwrap_or_default(),
        param_type: str_field(p, "type").unwrap_or_else(|| "string".to_string()),
        description: str_field(p, "description"),
        required: p.get("required").and_then(Value::as_bool).unwrap_or(false),
        schema: Some(p.get("schema").cloned().unwrap_or_else(|| json!({}))),
        example: p.get("example").cloned(),
        default: p.get("default").cloned(),
    }
}

fn agents_action(action: &Value) -> Result<AgentAction, SchemaError> {
    let id = str_field(action, "id").unwrap_or_default();
    let method = parse_method(action.get("method").and_then(Value::as_str), &id)?;
    let request_body = action.get("requestBody").map(|rb| RequestBodySpec {
        content_type: str_field(rb, "contentType").unwrap_or_else(|| "application/json".to_string()),
        schema: rb.get("schema").cloned().unwrap_or_else(|| json!({})),
    });
    let responses = action
        .get("responses")
        .and_then(|r| serde_json::from_value(r.clone()).ok());
    let tags = string_list(action, "tags");

    Ok(AgentAction {
        name: str_field(action, "name").unwrap_or_default(),
        description: str_field(action, "description"),
        endpoint: str_field(action, "endpoint").unwrap_or_default(),
        method,
        parameters: object_list(action, "parameters").map(agents_parameter).collect(),
        request_body,
        responses,
        tags: Some(tags),
        summary: str_field(action, "summary"),
        id,
    })
}

fn agents_flow(flow: &Value) -> AgentFlow {
    AgentFlow {
        id: str_field(flow, "id").unwrap_or_default(),
        name: str_field(flow, "name").unwrap_or_default(),
        description: str_field(flow, "description"),
        steps: object_list(flow, "steps")
            .map(|step| AgentFlowStep {
                action_id: str_field(step, "actionId").unwrap_or_default(),
                condition: str_field(step, "condition"),
                on_success: string_list(step, "onSuccess"),
                on_error: string_list(step, "onError"),
                parameters: step
                    .get("parameters")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect(),
        triggers: string_list(flow, "triggers"),
    }
}

fn agents_link(link: &Value) -> AgentLink {
    AgentLink {
        from: str_field(link, "from").unwrap_or_default(),
        to: str_field(link, "to").unwrap_or_default(),
        relation: str_field(link, "relation").unwrap_or_default(),
        description: str_field(link, "description"),
    }
}

/// Normalize a native agents.json document.
pub fn normalize_agents_json(
    doc: &Value,
    source_path: &str,
) -> Result<NormalizedSchema, SchemaError> {
    let actions = object_list(doc, "actions")
        .map(agents_action)
        .collect::<Result<Vec<_>, _>>()?;
    let flows: Vec<AgentFlow> = object_list(doc, "flows").map(agents_flow).collect();
    let links: Vec<AgentLink> = object_list(doc, "links").map(agents_link).collect();

    let version = str_field(doc, "version").unwrap_or_else(|| "1.0.0".to_string());
    let schema = AgentSchema {
        version: version.clone(),
        name: str_field(doc, "name").unwrap_or_else(|| "Agent API".to_string()),
        description: str_field(doc, "description"),
        base_url: non_empty(str_field(doc, "baseUrl")),
        actions,
        flows: (!flows.is_empty()).then_some(flows),
        links: (!links.is_empty()).then_some(links),
        metadata: Some(doc.clone()),
    };

    validate_schema(&schema)?;

    Ok(NormalizedSchema {
        schema,
        source: SchemaSource {
            kind: SchemaKind::AgentsJson,
            path: source_path.to_string(),
            version: Some(version),
        },
    })
}
