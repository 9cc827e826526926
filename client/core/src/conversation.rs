//! Conversation State
//!
//! The message list plus the lifecycle of the answer currently being streamed.
//! Every mutation returns the [`ConversationUpdate`]s it produced so the
//! owner can forward them to the UI in the same order they were applied.
//!
//! Each submitted message opens a new *generation*. Stream callbacks carry the
//! generation they were started with; anything from an older generation is a
//! leftover of a cancelled or superseded stream and is ignored.

use crate::messages::{ConversationMessage, MessageId, MessageRole, SearchPreview, SourceRef};
use crate::protocol::StreamEvent;

/// Shown when the stream fails for transport reasons
pub const RETRY_MESSAGE: &str =
    "Something went wrong while generating the answer. Please try again.";

/// Shown when the server rejects the credential
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Lifecycle of the current answer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamPhase {
    /// Nothing has been sent yet
    #[default]
    Idle,
    /// An answer is being streamed
    Streaming,
    /// The answer finished
    Completed,
    /// The user stopped the answer
    Cancelled,
    /// The server or the transport failed
    Errored,
}

impl StreamPhase {
    /// Whether this phase ends a stream
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Errored)
    }
}

/// Document retrieval progress for the current answer
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SearchStatus {
    /// No retrieval reported
    #[default]
    Idle,
    /// The server is searching documents
    Searching {
        /// Query being searched
        query: String,
    },
    /// Retrieval finished
    Found {
        /// Total hits
        count: u32,
        /// Top hits
        previews: Vec<SearchPreview>,
    },
}

/// A change to conversation state, in application order
#[derive(Clone, Debug, PartialEq)]
pub enum ConversationUpdate {
    /// A message was appended
    MessageAdded(ConversationMessage),
    /// The server assigned (or confirmed) the conversation
    SessionStarted {
        /// Conversation ID
        conversation_id: String,
    },
    /// Retrieval progress changed
    Search(SearchStatus),
    /// A delta was appended to a streaming message
    ContentDelta {
        /// Target message
        id: MessageId,
        /// Appended text
        delta: String,
    },
    /// A message's content was replaced wholesale
    ContentReplaced {
        /// Target message
        id: MessageId,
        /// New content
        content: String,
    },
    /// A structured payload was attached
    Structured {
        /// Target message
        id: MessageId,
    },
    /// Citations were attached
    Sources {
        /// Target message
        id: MessageId,
        /// Citations
        sources: Vec<SourceRef>,
    },
    /// The server issued the permanent ID for a placeholder message
    ///
    /// Sent on `done`, before `Finished`, which already uses `id`.
    IdAssigned {
        /// Placeholder ID used by earlier updates
        previous: MessageId,
        /// Server-issued ID
        id: MessageId,
        /// Server-side generation time
        elapsed_ms: Option<u64>,
    },
    /// The streamed message stopped streaming
    Finished {
        /// Final message ID (server-issued after `done`)
        id: MessageId,
        /// Terminal phase
        phase: StreamPhase,
    },
    /// The message list was replaced
    Reset {
        /// Conversation now shown, if any
        conversation_id: Option<String>,
    },
}

/// Messages and streaming lifecycle of one conversation
#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<ConversationMessage>,
    conversation_id: Option<String>,
    model: Option<String>,
    provider: Option<String>,
    phase: StreamPhase,
    streaming_id: Option<MessageId>,
    search_status: SearchStatus,
    generation: u64,
}

impl ConversationState {
    /// Create an empty conversation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages in order
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Server-assigned conversation ID
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Model reported by the last `session` event
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Provider reported by the last `session` event
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Retrieval progress of the current answer
    #[must_use]
    pub fn search_status(&self) -> &SearchStatus {
        &self.search_status
    }

    /// Whether updates tagged with `generation` still apply
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.phase == StreamPhase::Streaming
    }

    /// Append the user's message and an empty assistant placeholder
    ///
    /// Returns the new generation. The caller must have checked that no
    /// stream is active.
    pub fn begin_turn(&mut self, text: &str) -> (u64, Vec<ConversationUpdate>) {
        let user = ConversationMessage::new(MessageRole::User, text);
        let placeholder = ConversationMessage::placeholder();

        self.generation += 1;
        self.phase = StreamPhase::Streaming;
        self.streaming_id = Some(placeholder.id.clone());
        self.search_status = SearchStatus::Idle;

        let updates = vec![
            ConversationUpdate::MessageAdded(user.clone()),
            ConversationUpdate::MessageAdded(placeholder.clone()),
        ];
        self.messages.push(user);
        self.messages.push(placeholder);

        tracing::debug!(generation = self.generation, "Turn started");
        (self.generation, updates)
    }

    /// Apply one stream event
    pub fn apply_event(&mut self, generation: u64, event: StreamEvent) -> Vec<ConversationUpdate> {
        if !self.is_current(generation) {
            tracing::trace!(generation, kind = event.kind(), "Ignoring stale event");
            return Vec::new();
        }

        match event {
            StreamEvent::Session {
                conversation_id,
                model,
                provider,
            } => {
                self.conversation_id = Some(conversation_id.clone());
                if model.is_some() {
                    self.model = model;
                }
                if provider.is_some() {
                    self.provider = provider;
                }
                vec![ConversationUpdate::SessionStarted { conversation_id }]
            }

            StreamEvent::SearchStart { query } => {
                self.search_status = SearchStatus::Searching { query };
                vec![ConversationUpdate::Search(self.search_status.clone())]
            }

            StreamEvent::SearchResults { count, sources } => {
                self.search_status = SearchStatus::Found {
                    count,
                    previews: sources,
                };
                vec![ConversationUpdate::Search(self.search_status.clone())]
            }

            StreamEvent::Content { content } => {
                self.with_streaming(|msg| {
                    msg.append(&content);
                    ConversationUpdate::ContentDelta {
                        id: msg.id.clone(),
                        delta: content,
                    }
                })
            }

            StreamEvent::ContentComplete { content } => self.replace_content(content),

            StreamEvent::StructuredResponse(payload) => self.with_streaming(|msg| {
                msg.structured = Some(serde_json::Value::Object(payload));
                ConversationUpdate::Structured { id: msg.id.clone() }
            }),

            StreamEvent::Sources { sources } => self.with_streaming(|msg| {
                msg.sources = Some(sources.clone());
                ConversationUpdate::Sources {
                    id: msg.id.clone(),
                    sources,
                }
            }),

            StreamEvent::Done {
                message_id,
                response_time_ms,
                final_content,
            } => {
                let mut updates = match final_content {
                    Some(content) => self.replace_content(content),
                    None => Vec::new(),
                };
                let id = MessageId(message_id);
                if let Some(msg) = self.streaming_message() {
                    let previous = std::mem::replace(&mut msg.id, id.clone());
                    msg.elapsed_ms = response_time_ms;
                    updates.push(ConversationUpdate::IdAssigned {
                        previous,
                        id: id.clone(),
                        elapsed_ms: response_time_ms,
                    });
                }
                self.streaming_id = Some(id);
                updates.extend(self.finish(StreamPhase::Completed));
                updates
            }

            StreamEvent::Error { message } => {
                tracing::debug!(error = %message, "Server reported an error");
                let mut updates = self.replace_content(format!("Error: {message}"));
                updates.extend(self.finish(StreamPhase::Errored));
                updates
            }
        }
    }

    /// End the stream after a transport failure
    pub fn fail(&mut self, generation: u64, text: &str) -> Vec<ConversationUpdate> {
        if !self.is_current(generation) {
            return Vec::new();
        }
        let mut updates = self.replace_content(text.to_string());
        updates.extend(self.finish(StreamPhase::Errored));
        updates
    }

    /// End the stream when the body closed without `done` or `error`
    pub fn complete(&mut self, generation: u64) -> Vec<ConversationUpdate> {
        if !self.is_current(generation) {
            return Vec::new();
        }
        tracing::debug!("Stream ended without a terminal event");
        self.finish(StreamPhase::Completed)
    }

    /// Stop the active stream, keeping partial content
    ///
    /// Returns `None` when nothing was streaming.
    pub fn cancel(&mut self) -> Option<Vec<ConversationUpdate>> {
        if self.phase != StreamPhase::Streaming {
            return None;
        }
        Some(self.finish(StreamPhase::Cancelled))
    }

    /// Start over with an empty conversation
    pub fn reset(&mut self) -> Vec<ConversationUpdate> {
        self.replace_all(None, Vec::new())
    }

    /// Replace the message list with a reloaded conversation
    pub fn replace_all(
        &mut self,
        conversation_id: Option<String>,
        messages: Vec<ConversationMessage>,
    ) -> Vec<ConversationUpdate> {
        self.generation += 1;
        self.messages = messages;
        self.conversation_id = conversation_id.clone();
        self.phase = StreamPhase::Idle;
        self.streaming_id = None;
        self.search_status = SearchStatus::Idle;
        vec![ConversationUpdate::Reset { conversation_id }]
    }

    fn streaming_message(&mut self) -> Option<&mut ConversationMessage> {
        let id = self.streaming_id.as_ref()?;
        self.messages.iter_mut().rev().find(|m| &m.id == id)
    }

    fn with_streaming<F>(&mut self, f: F) -> Vec<ConversationUpdate>
    where
        F: FnOnce(&mut ConversationMessage) -> ConversationUpdate,
    {
        self.streaming_message().map(f).into_iter().collect()
    }

    fn replace_content(&mut self, content: String) -> Vec<ConversationUpdate> {
        self.with_streaming(|msg| {
            msg.content.clone_from(&content);
            ConversationUpdate::ContentReplaced {
                id: msg.id.clone(),
                content,
            }
        })
    }

    fn finish(&mut self, phase: StreamPhase) -> Vec<ConversationUpdate> {
        self.phase = phase;
        let updates = self.with_streaming(|msg| {
            msg.complete();
            ConversationUpdate::Finished {
                id: msg.id.clone(),
                phase,
            }
        });
        self.streaming_id = None;
        tracing::debug!(generation = self.generation, ?phase, "Turn finished");
        updates
    }
}
