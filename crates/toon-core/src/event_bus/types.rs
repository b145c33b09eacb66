use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Merged request parameters (query, body and path), keyed by name.
pub type Parameters = serde_json::Map<String, Value>;

/// Events are shared between subscribers, never copied or mutated.
pub type SharedEvent = Arc<Event>;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Closed set of occurrence kinds the gateway can publish.
///
/// Serializes as the snake_case wire name; deserializes through [`FromStr`],
/// so the legacy upper-case names are accepted wherever a kind is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum EventKind {
    /// An action invocation began
    ActionStarted,
    /// An action invocation finished (success or failure)
    ActionEnded,
    /// A flow began
    FlowStarted,
    /// A flow finished
    FlowEnded,
    /// Agent state changed
    StateUpdated,
    /// Standalone error report
    Error,
    /// Liveness signal
    Heartbeat,
    /// Reserved: streamed message text
    TextMessageContent,
    /// Reserved: tool call began
    ToolCallStarted,
    /// Reserved: tool call finished
    ToolCallEnded,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 10] = [
        EventKind::ActionStarted,
        EventKind::ActionEnded,
        EventKind::FlowStarted,
        EventKind::FlowEnded,
        EventKind::StateUpdated,
        EventKind::Error,
        EventKind::Heartbeat,
        EventKind::TextMessageContent,
        EventKind::ToolCallStarted,
        EventKind::ToolCallEnded,
    ];

    /// Wire name, as it appears in the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActionStarted => "action_started",
            Self::ActionEnded => "action_ended",
            Self::FlowStarted => "flow_started",
            Self::FlowEnded => "flow_ended",
            Self::StateUpdated => "state_updated",
            Self::Error => "error",
            Self::Heartbeat => "heartbeat",
            Self::TextMessageContent => "text_message_content",
            Self::ToolCallStarted => "tool_call_started",
            Self::ToolCallEnded => "tool_call_ended",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    /// Accepts wire names plus the legacy upper-case names
    /// (`ACTION_START`, `TOOL_CALL_END`, ...) older dashboards still send.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "action_started" | "ACTION_START" => Self::ActionStarted,
            "action_ended" | "ACTION_END" => Self::ActionEnded,
            "flow_started" | "FLOW_START" => Self::FlowStarted,
            "flow_ended" | "FLOW_END" => Self::FlowEnded,
            "state_updated" | "STATE_UPDATE" => Self::StateUpdated,
            "error" | "ERROR" => Self::Error,
            "heartbeat" | "HEARTBEAT" => Self::Heartbeat,
            "text_message_content" | "TEXT_MESSAGE_CONTENT" => Self::TextMessageContent,
            "tool_call_started" | "TOOL_CALL_START" => Self::ToolCallStarted,
            "tool_call_ended" | "TOOL_CALL_END" => Self::ToolCallEnded,
            other => return Err(UnknownEventKind(other.to_string())),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for EventKind {
    type Error = UnknownEventKind;

    fn try_from(value: String) -> Result<Self, UnknownEventKind> {
        value.parse()
    }
}

/// Speaker of a streamed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End user
    User,
    /// Agent
    Assistant,
    /// System prompt
    System,
}

/// Kind-specific attributes of an event.
///
/// Serialized with the kind as the `type` tag and camelCase field names, so
/// an [`Event`] renders as `{type, id, timestamp, ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EventPayload {
    /// Action invocation began
    ActionStarted {
        /// Correlation id shared with the matching `ActionEnded`
        action_id: String,
        /// Display name of the action
        action_name: String,
        /// Endpoint template
        endpoint: String,
        /// HTTP method
        method: String,
        /// Merged request parameters
        parameters: Parameters,
    },
    /// Action invocation finished
    ActionEnded {
        /// Correlation id shared with the matching `ActionStarted`
        action_id: String,
        /// Executor result on success
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
        /// Failure message
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Status returned to the HTTP caller
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        /// Whether the executor succeeded
        success: bool,
        /// Wall time from start to completion
        duration_ms: u64,
    },
    /// Flow began
    FlowStarted {
        /// Flow identifier
        flow_id: String,
        /// Display name
        flow_name: String,
        /// Parameters the flow was started with
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_parameters: Option<Parameters>,
    },
    /// Flow finished
    FlowEnded {
        /// Flow identifier
        flow_id: String,
        /// Final result
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        /// Whether the flow succeeded
        success: bool,
        /// Failure message
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// State changed
    StateUpdated {
        /// Full state after the change
        state: Parameters,
        /// Only the keys that changed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        changes: Option<Parameters>,
    },
    /// Error report
    Error {
        /// Human-readable message
        message: String,
        /// Machine-readable code
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Extra context
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    /// Liveness signal, no attributes
    Heartbeat,
    /// Streamed message text
    TextMessageContent {
        /// Text chunk
        content: String,
        /// Speaker
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<MessageRole>,
    },
    /// Tool call began
    ToolCallStarted {
        /// Tool name
        tool_name: String,
        /// Tool call id
        tool_id: String,
        /// Tool arguments
        parameters: Parameters,
    },
    /// Tool call finished
    ToolCallEnded {
        /// Tool call id
        tool_id: String,
        /// Tool output
        result: Value,
        /// Whether the tool succeeded
        success: bool,
        /// Failure message
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl EventPayload {
    /// Kind this payload belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ActionStarted { .. } => EventKind::ActionStarted,
            Self::ActionEnded { .. } => EventKind::ActionEnded,
            Self::FlowStarted { .. } => EventKind::FlowStarted,
            Self::FlowEnded { .. } => EventKind::FlowEnded,
            Self::StateUpdated { .. } => EventKind::StateUpdated,
            Self::Error { .. } => EventKind::Error,
            Self::Heartbeat => EventKind::Heartbeat,
            Self::TextMessageContent { .. } => EventKind::TextMessageContent,
            Self::ToolCallStarted { .. } => EventKind::ToolCallStarted,
            Self::ToolCallEnded { .. } => EventKind::ToolCallEnded,
        }
    }
}

/// One immutable occurrence: shared envelope plus kind-specific payload.
///
/// The kind is derived from the payload, so the two can never disagree. Ids
/// are caller-supplied; the bus does not check them for uniqueness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,
    timestamp: i64,
    #[serde(flatten)]
    payload: EventPayload,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(id: impl Into<String>, payload: EventPayload) -> Self {
        Self::with_timestamp(id, now_millis(), payload)
    }

    /// Create an event with an explicit timestamp (milliseconds since epoch).
    pub fn with_timestamp(id: impl Into<String>, timestamp: i64, payload: EventPayload) -> Self {
        Self {
            id: id.into(),
            timestamp,
            payload,
        }
    }

    /// Fresh heartbeat with a unique id.
    pub fn heartbeat() -> Self {
        let timestamp = now_millis();
        Self::with_timestamp(
            format!("heartbeat_{}_{}", timestamp, Uuid::new_v4().simple()),
            timestamp,
            EventPayload::Heartbeat,
        )
    }

    /// Event id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Milliseconds since epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Kind-specific attributes
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Dispatch key
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Wire form: `{type, id, timestamp, ...payload}`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Server-originated control frames that are not bus events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// First frame on every push connection
    Connected {
        /// Milliseconds since epoch
        timestamp: i64,
        /// Session identifier, for log correlation
        session_id: Uuid,
    },
    /// Current interest set after a subscribe/unsubscribe request
    Subscribed {
        /// Kinds the session now receives
        events: Vec<EventKind>,
    },
    /// Reply to a client ping
    Pong,
    /// Client sent something the server could not use
    Error {
        /// Human-readable message
        message: String,
        /// Machine-readable code
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ServerFrame {
    /// Connection confirmation stamped with the current time.
    pub fn connected(session_id: Uuid) -> Self {
        Self::Connected {
            timestamp: now_millis(),
            session_id,
        }
    }
}
