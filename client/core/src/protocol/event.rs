//! Stream Event Vocabulary
//!
//! One JSON object per `data:` frame, discriminated by its `type` field.

use serde::{Deserialize, Serialize};

use crate::messages::{SearchPreview, SourceRef};

/// A decoded event from the answer stream
///
/// The set is closed: a frame whose `type` is not listed here fails to decode
/// and is dropped by the frame decoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Conversation the answer belongs to
    Session {
        /// Server-assigned conversation ID
        conversation_id: String,
        /// Model generating the answer
        #[serde(default)]
        model: Option<String>,
        /// Provider serving the model
        #[serde(default)]
        provider: Option<String>,
    },

    /// Document retrieval started
    SearchStart {
        /// The query being searched
        #[serde(default)]
        query: String,
    },

    /// Document retrieval finished
    SearchResults {
        /// Total number of hits
        count: u32,
        /// Preview of the top hits
        #[serde(default, alias = "previews")]
        sources: Vec<SearchPreview>,
    },

    /// An incremental fragment of answer text
    Content {
        /// The delta
        content: String,
    },

    /// The full answer text generated so far
    ContentComplete {
        /// Complete content
        #[serde(alias = "full")]
        content: String,
    },

    /// A structured (non-text) answer payload
    StructuredResponse(serde_json::Map<String, serde_json::Value>),

    /// Source citations for the answer
    Sources {
        /// Citations
        sources: Vec<SourceRef>,
    },

    /// The answer finished successfully
    Done {
        /// Server-issued ID of the stored answer
        message_id: String,
        /// Time the server spent generating
        #[serde(default, alias = "elapsed_ms")]
        response_time_ms: Option<u64>,
        /// Post-processed content that supersedes the concatenated deltas
        #[serde(default)]
        final_content: Option<String>,
    },

    /// The server reported a failure
    Error {
        /// Server-provided message
        #[serde(alias = "error")]
        message: String,
    },
}

impl StreamEvent {
    /// Whether this event ends a well-formed stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Wire name of the event type
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::SearchStart { .. } => "search_start",
            Self::SearchResults { .. } => "search_results",
            Self::Content { .. } => "content",
            Self::ContentComplete { .. } => "content_complete",
            Self::StructuredResponse(_) => "structured_response",
            Self::Sources { .. } => "sources",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
