//! Event and message types for stream runs.
//!
//! Two discriminated unions cross the engine's boundaries: `RunnerEvent` is
//! the raw progress record a task runner reports while executing one
//! segment, and `StreamEvent` is the canonical shape the engine forwards to
//! the caller's callback and event queue. The per-segment `EventRouter`
//! turns one into the other.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use tokio::sync::mpsc;

use crate::host::Host;
use crate::types::{HostId, SegmentId, ToolName};

/// Unbounded mailbox the engine pushes canonical events into. The engine
/// only ever sends; the receiving half belongs to the caller.
pub type EventSender = mpsc::UnboundedSender<StreamEvent>;

/// Receiving half of an event mailbox.
pub type EventReceiver = mpsc::UnboundedReceiver<StreamEvent>;

/// Create an event mailbox pair for one or more runs.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Current time as an ISO-8601 string, the timestamp format every canonical
/// event carries.
pub(crate) fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Role of a chat message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// A message produced by delegating work to a host.
    Delegation,
    /// A tool invocation surfaced as a message.
    Function,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Delegation => "delegation",
            Self::Function => "function",
        };
        write!(f, "{}", s)
    }
}

/// One entry of a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    /// A plain system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
            timestamp: None,
        }
    }

    /// A plain user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
            timestamp: None,
        }
    }

    /// The fresh system message a segment starts from, derived from its
    /// host's persona. Blank attributes are left out entirely.
    pub fn system_for(host: &Host) -> Self {
        let mut content = format!("You are {}. Your goal is {}", host.role, host.goal);
        if let Some(attributes) = host.attributes.as_deref() {
            if !attributes.trim().is_empty() {
                content.push_str(" Your attributes are: ");
                content.push_str(attributes);
            }
        }
        Self::system(content.trim().to_string())
    }
}

/// A timestamp as reported by a task runner: either already a string, or a
/// native epoch-seconds number that must be normalized before forwarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventStamp {
    Text(String),
    Epoch(f64),
}

impl EventStamp {
    /// Render as an ISO-8601 string. Text stamps pass through unchanged;
    /// an epoch value outside chrono's representable range falls back to
    /// its decimal rendering.
    pub fn to_iso8601(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Epoch(secs) => {
                let whole = secs.trunc() as i64;
                let nanos = (secs.fract().abs() * 1e9) as u32;
                chrono::DateTime::from_timestamp(whole, nanos)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| secs.to_string())
            }
        }
    }
}

/// A raw progress record reported by the task runner while it executes one
/// segment. Classified by explicit variant, never by probing fields.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    /// A nested delegation finished and produced content.
    DelegationResult {
        content: String,
        /// Id of the nested task that produced this result, when the runner
        /// tracks one.
        conducted_task_id: Option<String>,
        timestamp: Option<EventStamp>,
    },
    /// The host's final answer for the segment.
    FinalResponse {
        content: String,
        timestamp: Option<EventStamp>,
    },
    /// The host invoked a tool.
    ToolCall {
        tool: ToolName,
        params: Value,
        timestamp: Option<EventStamp>,
    },
    /// A tool returned output to the host.
    ToolResult {
        tool: ToolName,
        content: Option<Value>,
        timestamp: Option<EventStamp>,
    },
    /// Any other typed record; `fields` keeps the full payload.
    Other {
        kind: String,
        fields: Map<String, Value>,
    },
}

impl RunnerEvent {
    pub fn delegation_result(content: impl Into<String>) -> Self {
        Self::DelegationResult {
            content: content.into(),
            conducted_task_id: None,
            timestamp: None,
        }
    }

    pub fn final_response(content: impl Into<String>) -> Self {
        Self::FinalResponse {
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn tool_call(tool: impl Into<ToolName>, params: Value) -> Self {
        Self::ToolCall {
            tool: tool.into(),
            params,
            timestamp: None,
        }
    }

    pub fn tool_result(tool: impl Into<ToolName>, content: Value) -> Self {
        Self::ToolResult {
            tool: tool.into(),
            content: Some(content),
            timestamp: None,
        }
    }

    /// Attach a source timestamp to this record.
    pub fn with_timestamp(mut self, stamp: EventStamp) -> Self {
        match &mut self {
            Self::DelegationResult { timestamp, .. }
            | Self::FinalResponse { timestamp, .. }
            | Self::ToolCall { timestamp, .. }
            | Self::ToolResult { timestamp, .. } => *timestamp = Some(stamp),
            Self::Other { fields, .. } => {
                let value = match &stamp {
                    EventStamp::Text(s) => Value::String(s.clone()),
                    EventStamp::Epoch(secs) => json!(secs),
                };
                fields.insert("timestamp".to_string(), value);
            }
        }
        self
    }

    /// Classify a wire-shaped record by its `type` tag.
    ///
    /// Field defaults mirror what runners actually omit: a missing `content`
    /// reads as empty, missing `params` as an empty object, and a record
    /// without a recognized tag becomes `Other` (kind `"event"` when the tag
    /// is absent altogether).
    pub fn from_value(value: &Value) -> Self {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("event");
        let timestamp = value
            .get("timestamp")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        match kind {
            "delegation_result" => Self::DelegationResult {
                content: text_field(value, "content"),
                conducted_task_id: value
                    .get("conducted_task_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                timestamp,
            },
            "final_response" => Self::FinalResponse {
                content: text_field(value, "content"),
                timestamp,
            },
            "tool_call" => Self::ToolCall {
                tool: ToolName::new(value.get("tool").and_then(Value::as_str).unwrap_or_default()),
                params: value
                    .get("params")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new())),
                timestamp,
            },
            "tool_result" => Self::ToolResult {
                tool: ToolName::new(value.get("tool").and_then(Value::as_str).unwrap_or_default()),
                content: value.get("content").cloned(),
                timestamp,
            },
            other => Self::Other {
                kind: other.to_string(),
                fields: value.as_object().cloned().unwrap_or_default(),
            },
        }
    }

    /// Normalize any native source timestamp to an ISO-8601 string in place.
    pub fn normalized(mut self) -> Self {
        match &mut self {
            Self::DelegationResult { timestamp, .. }
            | Self::FinalResponse { timestamp, .. }
            | Self::ToolCall { timestamp, .. }
            | Self::ToolResult { timestamp, .. } => {
                if let Some(stamp) = timestamp.take() {
                    *timestamp = Some(EventStamp::Text(stamp.to_iso8601()));
                }
            }
            Self::Other { fields, .. } => {
                let epoch = fields.get("timestamp").and_then(Value::as_f64);
                if let Some(secs) = epoch {
                    let iso = EventStamp::Epoch(secs).to_iso8601();
                    fields.insert("timestamp".to_string(), Value::String(iso));
                }
            }
        }
        self
    }
}

fn text_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// A canonical event as forwarded to the caller's callback, event queue and
/// message log. Every variant carries an ISO-8601 `timestamp`; host-scoped
/// variants also carry `host_id` and `conducted_segment_id`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Emitted once per run, before any segment executes.
    DelegationStart {
        content: String,
        /// Every segment id of the run, in submitted order.
        segments: Vec<SegmentId>,
        timestamp: String,
    },
    /// A host finished (or a nested delegation resolved) with content.
    DelegationResult {
        /// The host that conducted the segment.
        name: HostId,
        content: String,
        conducted_segment_id: SegmentId,
        conducted_task_id: Option<String>,
        timestamp: String,
    },
    ToolCall {
        /// `Role::Delegation` for nested orchestration calls, otherwise
        /// `Role::Function`.
        role: Role,
        tool: ToolName,
        params: Value,
        host_id: HostId,
        conducted_segment_id: SegmentId,
        timestamp: String,
    },
    ToolResult {
        tool: ToolName,
        content: Option<Value>,
        host_id: HostId,
        conducted_segment_id: SegmentId,
        timestamp: String,
    },
    /// Any other typed record, enriched with the segment scope.
    Other {
        kind: String,
        fields: Map<String, Value>,
        host_id: HostId,
        conducted_segment_id: SegmentId,
        timestamp: String,
    },
}

impl StreamEvent {
    /// The value of the event's `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            Self::DelegationStart { .. } => "delegation",
            Self::DelegationResult { .. } => "delegation_result",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Other { kind, .. } => kind,
        }
    }

    /// The event's ISO-8601 timestamp.
    pub fn timestamp(&self) -> &str {
        match self {
            Self::DelegationStart { timestamp, .. }
            | Self::DelegationResult { timestamp, .. }
            | Self::ToolCall { timestamp, .. }
            | Self::ToolResult { timestamp, .. }
            | Self::Other { timestamp, .. } => timestamp,
        }
    }

    /// Serialize to the JSON wire shape, variant by variant.
    ///
    /// For `Other`, the record's own fields come first and the attached
    /// scope fields (`type`, `host_id`, `conducted_segment_id`,
    /// `timestamp`) overwrite same-named entries.
    pub fn to_value(&self) -> Value {
        match self {
            Self::DelegationStart {
                content,
                segments,
                timestamp,
            } => json!({
                "type": "delegation",
                "role": "assistant",
                "name": "delegation",
                "content": content,
                "segments": segments,
                "timestamp": timestamp,
            }),
            Self::DelegationResult {
                name,
                content,
                conducted_segment_id,
                conducted_task_id,
                timestamp,
            } => {
                let mut value = json!({
                    "type": "delegation_result",
                    "role": "delegation",
                    "name": name,
                    "content": content,
                    "conducted_segment_id": conducted_segment_id,
                    "timestamp": timestamp,
                });
                if let (Some(task_id), Some(obj)) = (conducted_task_id, value.as_object_mut()) {
                    obj.insert("conducted_task_id".to_string(), json!(task_id));
                }
                value
            }
            Self::ToolCall {
                role,
                tool,
                params,
                host_id,
                conducted_segment_id,
                timestamp,
            } => json!({
                "type": "tool_call",
                "role": role,
                "tool": tool,
                "params": params,
                "host_id": host_id,
                "conducted_segment_id": conducted_segment_id,
                "timestamp": timestamp,
            }),
            Self::ToolResult {
                tool,
                content,
                host_id,
                conducted_segment_id,
                timestamp,
            } => {
                let mut value = json!({
                    "type": "tool_result",
                    "tool": tool,
                    "host_id": host_id,
                    "conducted_segment_id": conducted_segment_id,
                    "timestamp": timestamp,
                });
                if let (Some(content), Some(obj)) = (content, value.as_object_mut()) {
                    obj.insert("content".to_string(), content.clone());
                }
                value
            }
            Self::Other {
                kind,
                fields,
                host_id,
                conducted_segment_id,
                timestamp,
            } => {
                let mut merged = fields.clone();
                merged.insert("type".to_string(), json!(kind));
                merged.insert("host_id".to_string(), json!(host_id));
                merged.insert(
                    "conducted_segment_id".to_string(),
                    json!(conducted_segment_id),
                );
                merged.insert("timestamp".to_string(), json!(timestamp));
                Value::Object(merged)
            }
        }
    }

    /// The dedup bookkeeping signature: `type:content:host_id`, extended
    /// per kind (tool + params for tool calls, tool for tool results,
    /// conducted ids for delegation results).
    ///
    /// Delegation-Start events are never queued and have no signature.
    pub fn signature(&self) -> Option<String> {
        match self {
            Self::DelegationStart { .. } => None,
            Self::DelegationResult {
                name,
                content,
                conducted_segment_id,
                conducted_task_id,
                ..
            } => Some(format!(
                "delegation_result:{}:{}:delegation:{}:delegation:{}",
                content,
                name,
                conducted_segment_id,
                conducted_task_id.as_deref().unwrap_or("none"),
            )),
            Self::ToolCall {
                tool,
                params,
                host_id,
                ..
            } => Some(format!("tool_call:none:{}:{}:{}", host_id, tool, params)),
            Self::ToolResult {
                tool,
                content,
                host_id,
                ..
            } => Some(format!(
                "tool_result:{}:{}:{}",
                content_signature(content.as_ref()),
                host_id,
                tool,
            )),
            Self::Other {
                kind,
                fields,
                host_id,
                ..
            } => Some(format!(
                "{}:{}:{}",
                kind,
                content_signature(fields.get("content")),
                host_id,
            )),
        }
    }

    /// The message-log entry for this event, for the delegation variants
    /// that land in the shared conversation log.
    pub fn as_message(&self) -> Option<Message> {
        match self {
            Self::DelegationStart {
                content, timestamp, ..
            } => Some(Message {
                role: Role::Assistant,
                content: content.clone(),
                name: Some("delegation".to_string()),
                timestamp: Some(timestamp.clone()),
            }),
            Self::DelegationResult {
                name,
                content,
                timestamp,
                ..
            } => Some(Message {
                role: Role::Delegation,
                content: content.clone(),
                name: Some(name.to_string()),
                timestamp: Some(timestamp.clone()),
            }),
            _ => None,
        }
    }
}

fn content_signature(content: Option<&Value>) -> String {
    match content {
        None => "none".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Host;

    #[test]
    fn test_event_stamp_text_passes_through() {
        let stamp = EventStamp::Text("2024-05-01T12:00:00+00:00".to_string());
        assert_eq!(stamp.to_iso8601(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_event_stamp_epoch_normalizes() {
        let stamp = EventStamp::Epoch(0.0);
        assert_eq!(stamp.to_iso8601(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_event_stamp_deserializes_number_or_string() {
        let epoch: EventStamp = serde_json::from_str("1700000000").unwrap();
        assert_eq!(epoch, EventStamp::Epoch(1700000000.0));

        let text: EventStamp = serde_json::from_str("\"2024-05-01T12:00:00Z\"").unwrap();
        assert_eq!(text, EventStamp::Text("2024-05-01T12:00:00Z".to_string()));
    }

    #[test]
    fn test_runner_event_from_value_classifies_by_tag() {
        let event = RunnerEvent::from_value(&json!({
            "type": "delegation_result",
            "content": "done",
            "conducted_task_id": "task_9",
        }));
        assert_eq!(
            event,
            RunnerEvent::DelegationResult {
                content: "done".to_string(),
                conducted_task_id: Some("task_9".to_string()),
                timestamp: None,
            }
        );

        let event = RunnerEvent::from_value(&json!({
            "type": "tool_call",
            "tool": "web_search",
        }));
        assert_eq!(
            event,
            RunnerEvent::ToolCall {
                tool: ToolName::new("web_search"),
                params: json!({}),
                timestamp: None,
            }
        );
    }

    #[test]
    fn test_runner_event_from_value_unknown_kind_is_other() {
        let event = RunnerEvent::from_value(&json!({
            "type": "status",
            "content": "thinking",
        }));
        match event {
            RunnerEvent::Other { kind, fields } => {
                assert_eq!(kind, "status");
                assert_eq!(fields.get("content"), Some(&json!("thinking")));
            }
            other => panic!("expected Other, got {:?}", other),
        }

        let event = RunnerEvent::from_value(&json!({"content": "untyped"}));
        match event {
            RunnerEvent::Other { kind, .. } => assert_eq!(kind, "event"),
            other => panic!("expected Other, got {:?}", other),
        }
    }

    #[test]
    fn test_runner_event_normalizes_epoch_timestamp() {
        let event = RunnerEvent::final_response("done")
            .with_timestamp(EventStamp::Epoch(0.0))
            .normalized();
        match event {
            RunnerEvent::FinalResponse { timestamp, .. } => {
                assert_eq!(
                    timestamp,
                    Some(EventStamp::Text("1970-01-01T00:00:00+00:00".to_string()))
                );
            }
            other => panic!("expected FinalResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_runner_event_normalizes_epoch_inside_other_fields() {
        let event = RunnerEvent::from_value(&json!({
            "type": "status",
            "timestamp": 0,
        }))
        .normalized();
        match event {
            RunnerEvent::Other { fields, .. } => {
                assert_eq!(
                    fields.get("timestamp"),
                    Some(&json!("1970-01-01T00:00:00+00:00"))
                );
            }
            other => panic!("expected Other, got {:?}", other),
        }
    }

    #[test]
    fn test_delegation_start_wire_shape() {
        let event = StreamEvent::DelegationStart {
            content: "Starting multi-host flow with 2 segments".to_string(),
            segments: vec![SegmentId::new("s1"), SegmentId::new("s2")],
            timestamp: "2024-05-01T12:00:00+00:00".to_string(),
        };

        let value = event.to_value();
        assert_eq!(value["type"], "delegation");
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["name"], "delegation");
        assert_eq!(value["segments"], json!(["s1", "s2"]));
        assert_eq!(value["timestamp"], "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_other_wire_shape_scope_fields_win() {
        let mut fields = Map::new();
        fields.insert("detail".to_string(), json!("x"));
        fields.insert("host_id".to_string(), json!("spoofed"));

        let event = StreamEvent::Other {
            kind: "status".to_string(),
            fields,
            host_id: HostId::new("narrator"),
            conducted_segment_id: SegmentId::new("intro"),
            timestamp: "t".to_string(),
        };

        let value = event.to_value();
        assert_eq!(value["type"], "status");
        assert_eq!(value["detail"], "x");
        assert_eq!(value["host_id"], "narrator");
        assert_eq!(value["conducted_segment_id"], "intro");
    }

    #[test]
    fn test_tool_call_signatures_match_for_identical_events() {
        let make = || StreamEvent::ToolCall {
            role: Role::Function,
            tool: ToolName::new("web_search"),
            params: json!({"query": "weather"}),
            host_id: HostId::new("narrator"),
            conducted_segment_id: SegmentId::new("intro"),
            timestamp: now_iso8601(),
        };

        // Timestamps differ between the two events; signatures must not.
        assert_eq!(make().signature(), make().signature());
    }

    #[test]
    fn test_tool_call_signatures_differ_by_params() {
        let make = |query: &str| StreamEvent::ToolCall {
            role: Role::Function,
            tool: ToolName::new("web_search"),
            params: json!({ "query": query }),
            host_id: HostId::new("narrator"),
            conducted_segment_id: SegmentId::new("intro"),
            timestamp: "t".to_string(),
        };

        assert_ne!(
            make("weather").signature(),
            make("traffic").signature()
        );
    }

    #[test]
    fn test_delegation_result_signature_shape() {
        let event = StreamEvent::DelegationResult {
            name: HostId::new("narrator"),
            content: "done".to_string(),
            conducted_segment_id: SegmentId::new("intro"),
            conducted_task_id: None,
            timestamp: "t".to_string(),
        };

        assert_eq!(
            event.signature().as_deref(),
            Some("delegation_result:done:narrator:delegation:intro:delegation:none")
        );
    }

    #[test]
    fn test_delegation_start_has_no_signature() {
        let event = StreamEvent::DelegationStart {
            content: "start".to_string(),
            segments: vec![],
            timestamp: "t".to_string(),
        };
        assert!(event.signature().is_none());
    }

    #[test]
    fn test_as_message_for_delegation_variants_only() {
        let start = StreamEvent::DelegationStart {
            content: "start".to_string(),
            segments: vec![],
            timestamp: "t".to_string(),
        };
        let message = start.as_message().unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.name.as_deref(), Some("delegation"));

        let result = StreamEvent::DelegationResult {
            name: HostId::new("narrator"),
            content: "done".to_string(),
            conducted_segment_id: SegmentId::new("intro"),
            conducted_task_id: None,
            timestamp: "t".to_string(),
        };
        let message = result.as_message().unwrap();
        assert_eq!(message.role, Role::Delegation);
        assert_eq!(message.name.as_deref(), Some("narrator"));

        let tool = StreamEvent::ToolResult {
            tool: ToolName::new("web_search"),
            content: None,
            host_id: HostId::new("narrator"),
            conducted_segment_id: SegmentId::new("intro"),
            timestamp: "t".to_string(),
        };
        assert!(tool.as_message().is_none());
    }

    #[test]
    fn test_system_message_includes_attributes_when_present() {
        let host = Host::new("narrator", "Storyteller", "Narrate the stream.")
            .with_attributes("Warm and vivid.");
        let message = Message::system_for(&host);
        assert_eq!(
            message.content,
            "You are Storyteller. Your goal is Narrate the stream. Your attributes are: Warm and vivid."
        );

        let plain = Host::new("narrator", "Storyteller", "Narrate the stream.");
        assert_eq!(
            Message::system_for(&plain).content,
            "You are Storyteller. Your goal is Narrate the stream."
        );
    }

    #[test]
    fn test_system_message_skips_blank_attributes() {
        let host = Host::new("narrator", "Storyteller", "Narrate").with_attributes("   ");
        assert_eq!(
            Message::system_for(&host).content,
            "You are Storyteller. Your goal is Narrate"
        );
    }
}
