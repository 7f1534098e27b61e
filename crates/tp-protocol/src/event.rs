//! Events decoded from the chat service's streaming response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a streamed event carries.
///
/// The wire names are the `type` values the chat service emits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The agent started a tool invocation.
    #[serde(rename = "tool_call")]
    ToolCall,
    /// A tool finished and reported back.
    #[serde(rename = "tool_result")]
    ToolResult,
    /// A fragment of incremental answer text.
    #[serde(rename = "token")]
    Token,
    /// The authoritative full answer.
    #[serde(rename = "final")]
    Final,
    /// A problem the service chose to report inline.
    #[serde(rename = "error")]
    Error,
}

impl EventKind {
    /// Whether events of this kind may carry metadata.
    pub fn carries_metadata(self) -> bool {
        matches!(self, Self::ToolCall | Self::ToolResult | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::Token => "token",
            Self::Final => "final",
            Self::Error => "error",
        }
    }
}

/// Optional details attached to tool and error events.
///
/// Kept as the JSON object the service sent. The well-known keys are read
/// through accessors that yield `None` when the value has an unexpected type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EventMetadata(Map<String, Value>);

impl EventMetadata {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.get("tool_name").and_then(Value::as_str)
    }

    pub fn tool_input(&self) -> Option<&Value> {
        self.get("tool_input")
    }

    pub fn observation(&self) -> Option<&Value> {
        self.get("observation")
    }

    pub fn error_type(&self) -> Option<&str> {
        self.get("error_type").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for EventMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Frame payload as it arrives, before metadata is checked against the kind.
#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    content: String,
    #[serde(default)]
    metadata: Option<Value>,
}

impl From<WireEvent> for StreamEvent {
    fn from(wire: WireEvent) -> Self {
        // Non-object metadata is treated as absent.
        let metadata = match wire.metadata {
            Some(Value::Object(map)) if wire.kind.carries_metadata() => {
                Some(EventMetadata(map))
            }
            _ => None,
        };
        Self {
            kind: wire.kind,
            content: wire.content,
            metadata,
        }
    }
}

/// One event from the stream, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "WireEvent")]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

impl StreamEvent {
    pub fn new(kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn tool_call(content: impl Into<String>) -> Self {
        Self::new(EventKind::ToolCall, content)
    }

    pub fn tool_result(content: impl Into<String>) -> Self {
        Self::new(EventKind::ToolResult, content)
    }

    pub fn token(content: impl Into<String>) -> Self {
        Self::new(EventKind::Token, content)
    }

    pub fn final_answer(content: impl Into<String>) -> Self {
        Self::new(EventKind::Final, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(EventKind::Error, content)
    }

    /// Decode a frame payload (the text after `data: `).
    ///
    /// Metadata sent alongside `token` or `final` events is discarded
    /// without being looked at.
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Encode as a frame payload, the inverse of [`StreamEvent::decode`].
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
