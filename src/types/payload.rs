//! API payload types
//!
//! Request and response bodies exchanged with the chat backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::message::Role;

/// One prior turn replayed to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Body of `POST /chat` and `POST /chat/stream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's question, already trimmed
    pub message: String,
    /// Conversation handle returned by a previous answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Prior settled turns, oldest first
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Retrieved document the answer was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A menu the assistant recommends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedMenu {
    pub restaurant: String,
    pub menu: String,
    /// Price in won
    #[serde(default)]
    pub price: Option<u32>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of a successful `POST /chat`
///
/// Deserialization is the schema check: `response`, `conversation_id` and
/// `timestamp` must be present strings, the list fields may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub recommended_menus: Vec<RecommendedMenu>,
    pub conversation_id: String,
    pub timestamp: String,
}

/// Payload of one `data:` line of the event stream
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
}

impl StreamChunk {
    pub fn is_done(&self) -> bool {
        self.done == Some(true)
    }
}

/// What a finished stream resolves to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedStream {
    /// Full accumulated answer text
    pub content: String,
    pub conversation_id: Option<String>,
    pub sources: Vec<Source>,
}
