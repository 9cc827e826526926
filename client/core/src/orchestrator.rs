//! Conversation Stream Orchestrator
//!
//! Drives one answer stream per submitted message and turns its events into
//! conversation state changes.
//!
//! ```text
//! send_message ──► CredentialManager ──► StreamClient ──► TurnHandler
//!      │                                                      │
//!      └──────────── ConversationState (one lock) ◄───────────┘
//!                            │
//!                            └──► ConversationUpdate channel ──► UI
//! ```
//!
//! At most one stream is active. A send while streaming is rejected; the
//! caller stops the current answer first.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::CredentialManager;
use crate::config::{ChatDefaults, ClientConfig, ServerConfig};
use crate::conversation::{
    ConversationState, ConversationUpdate, SearchStatus, StreamPhase, RETRY_MESSAGE,
    SESSION_EXPIRED_MESSAGE,
};
use crate::error::{ChatError, ClientError};
use crate::history::parse_history;
use crate::messages::ConversationMessage;
use crate::protocol::{StreamClient, StreamEvent, StreamHandler, StreamOutcome, StreamSession};
use crate::request::ChatRequest;
use crate::transport::{StreamRequest, Transport};

// ============================================================================
// Shared State
// ============================================================================

struct Inner {
    conversation: ConversationState,
    token: Option<CancellationToken>,
    session: Option<StreamSession>,
}

struct Shared {
    inner: Mutex<Inner>,
    updates: mpsc::UnboundedSender<ConversationUpdate>,
}

impl Shared {
    /// Mutate the conversation and publish the resulting updates
    ///
    /// Updates are sent while the lock is held so subscribers see them in
    /// the order they were applied.
    fn apply<F>(&self, f: F)
    where
        F: FnOnce(&mut ConversationState) -> Vec<ConversationUpdate>,
    {
        let mut inner = self.inner.lock();
        let updates = f(&mut inner.conversation);
        self.publish(updates);
    }

    fn publish(&self, updates: Vec<ConversationUpdate>) {
        for update in updates {
            if self.updates.send(update).is_err() {
                tracing::trace!("Update receiver dropped");
                break;
            }
        }
    }
}

// ============================================================================
// Stream Handler
// ============================================================================

/// Applies one stream's callbacks to the conversation
struct TurnHandler {
    shared: Arc<Shared>,
    generation: u64,
    credentials: Option<CredentialManager>,
}

impl StreamHandler for TurnHandler {
    fn on_event(&mut self, event: StreamEvent) {
        let generation = self.generation;
        self.shared
            .apply(|conversation| conversation.apply_event(generation, event));
    }

    fn on_error(&mut self, error: ClientError) {
        let text = if error.is_session_expired() {
            if let Some(ref credentials) = self.credentials {
                credentials.clear();
            }
            SESSION_EXPIRED_MESSAGE
        } else {
            RETRY_MESSAGE
        };
        tracing::warn!(error = %error, generation = self.generation, "Answer stream failed");

        let generation = self.generation;
        self.shared
            .apply(|conversation| conversation.fail(generation, text));
    }

    fn on_complete(&mut self) {
        let generation = self.generation;
        self.shared
            .apply(|conversation| conversation.complete(generation));
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Owns a conversation and the answer stream feeding it
pub struct ConversationOrchestrator<T: Transport> {
    client: StreamClient<T>,
    credentials: Option<CredentialManager>,
    server: ServerConfig,
    chat: ChatDefaults,
    shared: Arc<Shared>,
}

impl<T: Transport> ConversationOrchestrator<T> {
    /// Create an orchestrator publishing updates to `updates`
    pub fn new(
        transport: Arc<T>,
        config: &ClientConfig,
        updates: mpsc::UnboundedSender<ConversationUpdate>,
    ) -> Self {
        Self {
            client: StreamClient::new(transport),
            credentials: None,
            server: config.server.clone(),
            chat: config.chat.clone(),
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    conversation: ConversationState::new(),
                    token: None,
                    session: None,
                }),
                updates,
            }),
        }
    }

    /// Attach a credential manager; requests go out unauthenticated without one
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialManager) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Submit a message and start streaming the answer
    ///
    /// Returns once the stream is open; the answer arrives through the
    /// update channel.
    ///
    /// # Errors
    ///
    /// - [`ChatError::EmptyMessage`] if `text` is blank
    /// - [`ChatError::StreamInProgress`] if an answer is still streaming
    pub async fn send_message(&self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let (generation, token, conversation_id) = {
            let mut inner = self.shared.inner.lock();
            if inner.conversation.phase() == StreamPhase::Streaming {
                return Err(ChatError::StreamInProgress);
            }
            let (generation, updates) = inner.conversation.begin_turn(text);
            self.shared.publish(updates);

            let token = CancellationToken::new();
            inner.token = Some(token.clone());
            inner.session = None;
            let conversation_id = inner.conversation.conversation_id().map(str::to_string);
            (generation, token, conversation_id)
        };

        let bearer = self.bearer().await;

        let body = ChatRequest::new(text)
            .with_conversation(conversation_id)
            .with_model(self.chat.provider.clone(), self.chat.model.clone())
            .with_rag(self.chat.rag_enabled, self.chat.rag_settings.clone())
            .with_documents(self.chat.document_ids.clone())
            .with_expert(self.chat.expert.clone());
        let request = StreamRequest::new(self.server.stream_url(), body).with_bearer(bearer);

        let handler = TurnHandler {
            shared: Arc::clone(&self.shared),
            generation,
            credentials: self.credentials.clone(),
        };

        let mut inner = self.shared.inner.lock();
        if !inner.conversation.is_current(generation) {
            tracing::debug!(generation, "Turn stopped before the stream opened");
            return Ok(());
        }
        tracing::debug!(generation, "Opening stream for turn");
        inner.session = Some(self.client.open(request, handler, token));
        Ok(())
    }

    /// Stop the streaming answer, keeping what has arrived so far
    ///
    /// Returns `false` (and does nothing) when no answer is streaming.
    pub fn stop_streaming(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        let Some(updates) = inner.conversation.cancel() else {
            return false;
        };
        if let Some(token) = inner.token.take() {
            token.cancel();
        }
        self.shared.publish(updates);
        tracing::debug!("Streaming stopped by user");
        true
    }

    /// Wait for the current stream's reader to finish
    ///
    /// Returns `None` when no stream was opened since the last call.
    pub async fn wait_for_stream(&self) -> Option<StreamOutcome> {
        let session = self.shared.inner.lock().session.take()?;
        Some(session.join().await)
    }

    /// Whether an answer is streaming
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase() == StreamPhase::Streaming
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.shared.inner.lock().conversation.phase()
    }

    /// Snapshot of all messages
    #[must_use]
    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.shared.inner.lock().conversation.messages().to_vec()
    }

    /// Server-assigned conversation ID, once known
    #[must_use]
    pub fn conversation_id(&self) -> Option<String> {
        self.shared
            .inner
            .lock()
            .conversation
            .conversation_id()
            .map(str::to_string)
    }

    /// Retrieval progress of the current answer
    #[must_use]
    pub fn search_status(&self) -> SearchStatus {
        self.shared.inner.lock().conversation.search_status().clone()
    }

    /// Stop any answer and start an empty conversation
    pub fn new_conversation(&self) {
        let mut inner = self.shared.inner.lock();
        if let Some(token) = inner.token.take() {
            token.cancel();
        }
        inner.session = None;
        let updates = inner.conversation.reset();
        self.shared.publish(updates);
        tracing::debug!("New conversation");
    }

    /// Replace the message list with a stored conversation
    ///
    /// # Errors
    ///
    /// - [`ChatError::StreamInProgress`] if an answer is still streaming
    /// - [`ChatError::Client`] if the history request fails or cannot be decoded
    pub async fn load_history(&self, conversation_id: &str) -> Result<usize, ChatError> {
        if self.is_active() {
            return Err(ChatError::StreamInProgress);
        }

        let bearer = self.bearer().await;
        let url = self.server.history_url(conversation_id);
        let body = match self
            .client
            .transport()
            .get_json(&url, bearer.as_deref())
            .await
        {
            Ok(body) => body,
            Err(e) => {
                if e.is_session_expired() {
                    if let Some(ref credentials) = self.credentials {
                        credentials.clear();
                    }
                }
                return Err(e.into());
            }
        };
        let messages = parse_history(body)?;
        let count = messages.len();

        let mut inner = self.shared.inner.lock();
        if inner.conversation.phase() == StreamPhase::Streaming {
            return Err(ChatError::StreamInProgress);
        }
        inner.session = None;
        let updates = inner
            .conversation
            .replace_all(Some(conversation_id.to_string()), messages);
        self.shared.publish(updates);

        tracing::debug!(conversation_id, messages = count, "History loaded");
        Ok(count)
    }

    async fn bearer(&self) -> Option<String> {
        match self.credentials {
            Some(ref credentials) => credentials
                .get_valid_credential()
                .await
                .map(|credential| credential.value),
            None => None,
        }
    }
}
