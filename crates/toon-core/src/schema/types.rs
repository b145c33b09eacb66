use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP method an action is exposed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// Every supported method
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Whether upstream calls carry parameters in a JSON body rather than
    /// the query string
    pub fn sends_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported HTTP method '{}'", s))
    }
}

/// Declared input of an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentParameter {
    /// Parameter name
    pub name: String,
    /// JSON type name (`string`, `integer`, ...)
    #[serde(rename = "type")]
    pub param_type: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether callers must supply it
    #[serde(default)]
    pub required: bool,
    /// Full JSON schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Example value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Declared request body of an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBodySpec {
    /// Media type
    pub content_type: String,
    /// Body schema
    pub schema: Value,
}

/// Declared response of an action, keyed by status code in [`AgentAction`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON body schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// One HTTP endpoint the gateway exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAction {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Path template, e.g. `/users/{id}`
    pub endpoint: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Declared parameters
    #[serde(default)]
    pub parameters: Vec<AgentParameter>,
    /// Declared body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodySpec>,
    /// Declared responses by status code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses: Option<BTreeMap<String, ResponseSpec>>,
    /// Tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Step of a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentFlowStep {
    /// Action this step runs
    pub action_id: String,
    /// Guard expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Steps to follow on success
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_success: Vec<String>,
    /// Steps to follow on error
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_error: Vec<String>,
    /// Fixed parameters
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, Value>,
}

/// Named sequence of actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentFlow {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Steps in order
    #[serde(default)]
    pub steps: Vec<AgentFlowStep>,
    /// Trigger names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
}

/// Relation between two actions or flows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLink {
    /// Source id
    pub from: String,
    /// Target id
    pub to: String,
    /// Relation name
    pub relation: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Normalized schema, independent of the source dialect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSchema {
    /// Schema version
    pub version: String,
    /// Schema name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base URL of the real backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Actions
    pub actions: Vec<AgentAction>,
    /// Flows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flows: Option<Vec<AgentFlow>>,
    /// Links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<AgentLink>>,
    /// Dialect-specific extras
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AgentSchema {
    /// Number of declared flows
    pub fn flow_count(&self) -> usize {
        self.flows.as_ref().map_or(0, Vec::len)
    }

    /// Look up an action by id
    pub fn action(&self, id: &str) -> Option<&AgentAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Executable descriptors for every action
    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.actions
            .iter()
            .map(|action| ActionDescriptor::from_action(action, self.base_url.as_deref()))
            .collect()
    }
}

/// Source dialect of a schema document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaKind {
    /// OpenAPI 3 document
    #[serde(rename = "openapi")]
    OpenApi,
    /// agents.json document
    #[serde(rename = "agents-json")]
    AgentsJson,
}

/// Where a schema came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSource {
    /// Source dialect
    #[serde(rename = "type")]
    pub kind: SchemaKind,
    /// File path or URL
    pub path: String,
    /// Version declared by the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Loaded schema plus its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSchema {
    /// Normalized schema
    pub schema: AgentSchema,
    /// Provenance
    pub source: SchemaSource,
}

/// What the invocation pipeline needs to know about an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    /// Action identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Path template
    pub endpoint: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Base URL of the real backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ActionDescriptor {
    /// Build a descriptor from a schema action and the schema's base URL
    pub fn from_action(action: &AgentAction, base_url: Option<&str>) -> Self {
        Self {
            id: action.id.clone(),
            name: action.name.clone(),
            endpoint: action.endpoint.clone(),
            method: action.method,
            base_url: base_url.filter(|u| !u.is_empty()).map(str::to_string),
        }
    }
}
