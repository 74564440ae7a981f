//! Message types
//!
//! Defines the chat turn shown in the transcript and its sender role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::payload::{HistoryEntry, RecommendedMenu};

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user
    User,
    /// Message from the recommendation assistant
    Assistant,
}

/// A single chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier, stable for the lifetime of the message
    pub id: String,
    /// The role of the message sender
    pub role: Role,
    /// Text of the message; grows while an answer is streaming
    pub content: String,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// True while the assistant placeholder is waiting for its first text
    pub is_loading: bool,
    /// Menus attached to a single-shot answer
    #[serde(default)]
    pub recommended_menus: Vec<RecommendedMenu>,
    /// The content is an error notice, not an answer
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    /// Create a new settled message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_loading: false,
            recommended_menus: Vec::new(),
            is_error: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Empty assistant message shown while the answer is being produced
    pub fn placeholder() -> Self {
        Self {
            is_loading: true,
            ..Self::new(Role::Assistant, String::new())
        }
    }

    /// Copy of this message with new content and the loading flag cleared
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_loading: false,
            ..self.clone()
        }
    }

    /// Whether the message is replayed to the backend as context
    pub fn belongs_in_history(&self) -> bool {
        !self.is_loading && !self.is_error && !self.content.trim().is_empty()
    }

    pub fn to_history(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.role,
            content: self.content.clone(),
        }
    }
}
