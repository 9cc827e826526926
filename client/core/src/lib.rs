//! ragchat Core - Streaming Answer Client
//!
//! This crate is the client side of a document-grounded chat service: it
//! keeps an access credential fresh, reads the service's answer stream, and
//! turns stream events into conversation state a UI can render. It has no UI
//! dependencies; the `ragchat` CLI is one consumer, tests are another.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          UI / CLI                            │
//! │        send_message / stop_streaming      ConversationUpdate │
//! └──────────────┬───────────────────────────────────▲───────────┘
//!                │                                   │
//! ┌──────────────┼───────────────────────────────────┼───────────┐
//! │              ▼        RAGCHAT CORE               │           │
//! │  ┌───────────────────────────────────────────────┴─────────┐ │
//! │  │              ConversationOrchestrator                   │ │
//! │  │   ┌──────────────┐  ┌─────────────┐  ┌───────────────┐  │ │
//! │  │   │  Credential  │  │   Stream    │  │ Conversation  │  │ │
//! │  │   │   Manager    │  │   Client    │  │    State      │  │ │
//! │  │   └──────┬───────┘  └──────┬──────┘  └───────────────┘  │ │
//! │  └──────────┼─────────────────┼────────────────────────────┘ │
//! │             │          ┌──────┴──────┐                       │
//! │             │          │ FrameDecoder│                       │
//! │             │          └──────┬──────┘                       │
//! │  ┌──────────┴─────────────────┴────────────────────────────┐ │
//! │  │                 Transport (reqwest)                     │ │
//! │  └─────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ConversationOrchestrator`]: send/stop/reload for one conversation
//! - [`CredentialManager`]: access credential with single-flight renewal
//! - [`StreamClient`]: opens a stream and dispatches decoded events
//! - [`StreamEvent`]: the answer stream's event vocabulary
//! - [`ConversationUpdate`]: state changes pushed to the UI
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ragchat_core::{load_config, ConversationOrchestrator, HttpTransport};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let transport = Arc::new(HttpTransport::new(config.server.connect_timeout)?);
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let orchestrator = ConversationOrchestrator::new(transport, &config, tx);
//!
//!     orchestrator.send_message("What does the handbook say about leave?").await?;
//!     while let Some(update) = rx.recv().await {
//!         // Render update
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`auth`]: credential lifecycle and renewal
//! - [`protocol`]: event vocabulary, frame decoding, stream client
//! - [`transport`]: HTTP seam
//! - [`orchestrator`]: conversation stream orchestration
//! - [`conversation`]: conversation state machine and updates
//! - [`messages`]: message model
//! - [`request`]: stream-open payload
//! - [`history`]: stored conversation reload
//! - [`config`]: TOML and environment configuration
//! - [`error`]: error types

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod conversation;
pub mod error;
pub mod history;
pub mod messages;
pub mod orchestrator;
pub mod protocol;
pub mod request;
pub mod transport;

pub use auth::{
    Clock, Credential, CredentialManager, CredentialRenewer, CredentialStore,
    HttpCredentialRenewer, MemoryCredentialStore, RenewedCredential, SystemClock,
};
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ConfigError,
    ConfigOverrides, ConfigSource,
};
pub use conversation::{ConversationState, ConversationUpdate, SearchStatus, StreamPhase};
pub use error::{ChatError, ClientError, RenewalError};
pub use messages::{ConversationMessage, MessageId, MessageRole, SearchPreview, SourceRef};
pub use orchestrator::ConversationOrchestrator;
pub use protocol::{FrameDecoder, StreamClient, StreamEvent, StreamHandler, StreamOutcome};
pub use request::{ChatRequest, RagSettings};
pub use transport::{HttpTransport, StreamRequest, Transport};
