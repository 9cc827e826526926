//! Error Types
//!
//! Each concern gets its own error enum so callers can tell a transport
//! failure apart from a renewal failure or a rejected orchestrator call.
//!
//! Remote `error` events and cancellations are NOT errors. They are terminal
//! stream outcomes and never surface through these types.

use thiserror::Error;

/// Errors raised while opening or reading an answer stream
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the credential (HTTP 401)
    #[error("Session expired")]
    SessionExpired,

    /// The server answered with a non-success status
    #[error("Server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if it could be read
        body: String,
    },

    /// Network-level failure from the HTTP client
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether the failure means the user has to authenticate again
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

/// Errors from a credential renewal attempt
///
/// Cloneable because one renewal outcome is handed to every waiter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenewalError {
    /// The credential service refused to renew
    #[error("Renewal rejected with status {status}")]
    Rejected {
        /// HTTP status code
        status: u16,
    },

    /// The renewal request never produced a response
    #[error("Renewal transport error: {0}")]
    Transport(String),

    /// The response did not carry a usable token
    #[error("Invalid renewal response: {0}")]
    InvalidResponse(String),
}

/// Errors returned by the conversation orchestrator API
#[derive(Debug, Error)]
pub enum ChatError {
    /// A stream is already active; stop it first
    #[error("A response is already streaming")]
    StreamInProgress,

    /// The submitted message was blank
    #[error("Message is empty")]
    EmptyMessage,

    /// A non-streaming request failed
    #[error(transparent)]
    Client(#[from] ClientError),
}
