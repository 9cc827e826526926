//! Conversation History
//!
//! Reloads a stored conversation from
//! `GET /api/v1/chat/conversations/{id}/messages`.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::error::ClientError;
use crate::messages::{now_ms, ConversationMessage, MessageId, MessageRole, SourceRef};

/// One stored message as returned by the history endpoint
#[derive(Clone, Debug, Deserialize)]
pub struct HistoryMessage {
    /// Server-issued message ID
    pub message_id: String,
    /// Conversation the message belongs to
    pub conversation_id: String,
    /// `user`, `assistant` or `system`
    pub message_type: String,
    /// Message text
    pub content: String,
    /// Citations (assistant messages only)
    #[serde(default)]
    pub sources: Option<Vec<SourceRef>>,
    /// Generation time (assistant messages only)
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    /// Creation time as an ISO-8601 string
    pub created_at: String,
}

impl HistoryMessage {
    /// Convert to a finished conversation message
    #[must_use]
    pub fn into_message(self) -> ConversationMessage {
        let role = match self.message_type.as_str() {
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::System,
        };
        let created_at = parse_timestamp(&self.created_at).unwrap_or_else(|| {
            tracing::trace!(created_at = %self.created_at, "Unparseable timestamp");
            now_ms()
        });

        ConversationMessage {
            id: MessageId(self.message_id),
            role,
            content: self.content,
            sources: self.sources,
            elapsed_ms: self.response_time_ms,
            created_at,
            streaming: false,
            structured: None,
        }
    }
}

/// Decode a history response body into conversation messages
///
/// # Errors
///
/// Returns [`ClientError::Decode`] if the body is not a message list.
pub fn parse_history(body: serde_json::Value) -> Result<Vec<ConversationMessage>, ClientError> {
    let stored: Vec<HistoryMessage> =
        serde_json::from_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;
    Ok(stored.into_iter().map(HistoryMessage::into_message).collect())
}

/// Parse an ISO-8601 timestamp into Unix milliseconds
///
/// Timestamps without an offset are taken as UTC.
fn parse_timestamp(value: &str) -> Option<u64> {
    let millis = DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .map(|dt| dt.timestamp_millis())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
                .map(|naive| naive.and_utc().timestamp_millis())
        })
        .ok()?;
    u64::try_from(millis).ok()
}
