//! Request and response bodies for the chat service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one planning conversation with the chat service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of both `/chat` and `/chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub session_id: SessionId,
    pub input: String,
}

impl ChatRequest {
    pub fn new(session_id: SessionId, input: impl Into<String>) -> Self {
        Self {
            session_id,
            input: input.into(),
        }
    }
}

/// Body returned by the non-streaming `/chat` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}
