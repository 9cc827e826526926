//! Stream-Open Request Payload
//!
//! The body posted to the answer service when a message is submitted.
//! Field names follow the service's wire format.

use serde::{Deserialize, Serialize};

/// Retrieval settings forwarded to the answer service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Minimum similarity score for a retrieved chunk (0.0-1.0)
    pub similarity_threshold: f32,
    /// Maximum chunks to retrieve (1-50)
    pub max_chunks: u32,
    /// Similarity metric name (e.g. "cosine")
    pub similarity_method: String,
    /// Search strategy: "vector", "bm25" or "hybrid"
    pub search_method: String,
    /// Weight of the keyword score in hybrid search (0.0-1.0)
    pub bm25_weight: f32,
    /// Weight of the vector score in hybrid search (0.0-1.0)
    pub vector_weight: f32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            max_chunks: 10,
            similarity_method: "cosine".to_string(),
            search_method: "hybrid".to_string(),
            bm25_weight: 0.4,
            vector_weight: 0.6,
        }
    }
}

impl RagSettings {
    /// Check ranges accepted by the answer service
    ///
    /// # Errors
    ///
    /// Returns a description of the first out-of-range field.
    pub fn validate(&self) -> Result<(), String> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold must be within 0.0-1.0 (got {})",
                self.similarity_threshold
            ));
        }
        if !(1..=50).contains(&self.max_chunks) {
            return Err(format!(
                "max_chunks must be within 1-50 (got {})",
                self.max_chunks
            ));
        }
        if !unit.contains(&self.bm25_weight) || !unit.contains(&self.vector_weight) {
            return Err("bm25_weight and vector_weight must be within 0.0-1.0".to_string());
        }
        Ok(())
    }
}

/// Body of the stream-open call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,
    /// Server-assigned conversation ID, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Whether retrieval is enabled
    pub rag_enabled: bool,
    /// Retrieval tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_settings: Option<RagSettings>,
    /// Restrict retrieval to these documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
    /// LLM provider name
    pub provider: String,
    /// Model name (server default when absent)
    pub model: Option<String>,
    /// Expert persona, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expert: Option<String>,
    /// Always true for this client
    pub stream: bool,
}

impl ChatRequest {
    /// Create a streaming request for a message with default parameters
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            rag_enabled: true,
            rag_settings: None,
            document_ids: None,
            provider: "ollama".to_string(),
            model: None,
            expert: None,
            stream: true,
        }
    }

    /// Continue an existing conversation
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: Option<String>) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    /// Set provider and model
    #[must_use]
    pub fn with_model(mut self, provider: impl Into<String>, model: Option<String>) -> Self {
        self.provider = provider.into();
        self.model = model;
        self
    }

    /// Enable or disable retrieval, with optional tuning
    #[must_use]
    pub fn with_rag(mut self, enabled: bool, settings: Option<RagSettings>) -> Self {
        self.rag_enabled = enabled;
        self.rag_settings = if enabled { settings } else { None };
        self
    }

    /// Restrict retrieval to a document set (empty means no restriction)
    #[must_use]
    pub fn with_documents(mut self, document_ids: Vec<String>) -> Self {
        self.document_ids = if document_ids.is_empty() {
            None
        } else {
            Some(document_ids)
        };
        self
    }

    /// Set the expert persona
    #[must_use]
    pub fn with_expert(mut self, expert: Option<String>) -> Self {
        self.expert = expert;
        self
    }
}
