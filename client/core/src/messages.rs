//! Conversation Messages
//!
//! The message model the UI renders. Assistant messages start life as a
//! streaming placeholder with a client-side ID and are rewritten in place as
//! stream events arrive.

use serde::{Deserialize, Serialize};

/// Unique message identifier
///
/// Client-side placeholders use a `local_` prefix until the server issues the
/// real ID in its `done` event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new client-side message ID
    pub fn new() -> Self {
        Self(format!("local_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Whether this ID was issued by the server
    #[must_use]
    pub fn is_server_issued(&self) -> bool {
        !self.0.starts_with("local_")
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The human user
    User,
    /// The answer service
    Assistant,
    /// Client or server notices
    System,
}

/// A source citation attached to an answer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// 1-based citation number
    pub index: u32,
    /// Document identifier
    pub document_id: String,
    /// Display name of the document
    pub document_name: String,
    /// Page number, when known
    #[serde(default)]
    pub page_number: Option<u32>,
    /// Section title, when known
    #[serde(default)]
    pub section: Option<String>,
    /// Snippet of the cited chunk
    #[serde(default)]
    pub content_preview: String,
    /// Retrieval score
    #[serde(default)]
    pub score: f64,
}

/// A retrieval hit preview sent while the answer is being prepared
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchPreview {
    /// Document title or file name
    #[serde(default)]
    pub document: Option<String>,
    /// Page number, when known
    #[serde(default)]
    pub page: Option<u32>,
    /// Retrieval score
    #[serde(default)]
    pub score: f64,
}

/// A message in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Message ID (client placeholder until the server issues one)
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Source citations, set at most once per stream
    pub sources: Option<Vec<SourceRef>>,
    /// Server-reported generation time
    pub elapsed_ms: Option<u64>,
    /// When the message was created (Unix timestamp ms)
    pub created_at: u64,
    /// Whether the message is still being streamed
    pub streaming: bool,
    /// Structured payload from a `structured_response` event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
}

impl ConversationMessage {
    /// Create a new complete message
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            sources: None,
            elapsed_ms: None,
            created_at: now_ms(),
            streaming: false,
            structured: None,
        }
    }

    /// Create an empty assistant placeholder that will be streamed into
    pub fn placeholder() -> Self {
        Self {
            streaming: true,
            ..Self::new(MessageRole::Assistant, String::new())
        }
    }

    /// Append a delta to a streaming message
    pub fn append(&mut self, text: &str) {
        self.content.push_str(text);
    }

    /// Mark streaming as complete
    pub fn complete(&mut self) {
        self.streaming = false;
    }
}

/// Current timestamp in milliseconds
pub(crate) fn now_ms() -> u64 {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
}
