//! Request Transport
//!
//! The seam between the stream consumer and the network. The protocol client
//! only needs "send this request, give me the body as a byte stream"; how the
//! bytes get here is the transport's business.
//!
//! - [`HttpTransport`]: `reqwest` implementation used in production
//! - `test_utils::ScriptedTransport`: in-memory transport for unit tests

mod http;

#[cfg(test)]
pub(crate) mod test_utils;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ClientError;
use crate::request::ChatRequest;

pub use http::HttpTransport;

/// Response body as a stream of byte chunks in arrival order
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// A stream-open call
#[derive(Clone)]
pub struct StreamRequest {
    /// Endpoint URL
    pub url: String,
    /// JSON body
    pub body: ChatRequest,
    /// Bearer credential, when one is available
    pub bearer: Option<String>,
}

impl StreamRequest {
    /// Create a request to `url` carrying `body`
    pub fn new(url: impl Into<String>, body: ChatRequest) -> Self {
        Self {
            url: url.into(),
            body,
            bearer: None,
        }
    }

    /// Attach a bearer credential
    #[must_use]
    pub fn with_bearer(mut self, bearer: Option<String>) -> Self {
        self.bearer = bearer;
        self
    }
}

impl std::fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequest")
            .field("url", &self.url)
            .field("body", &self.body)
            .field("authenticated", &self.bearer.is_some())
            .finish()
    }
}

/// Issues requests on behalf of the client
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a stream-open request and return the response body stream
    ///
    /// Non-success statuses are errors; 401 maps to
    /// [`ClientError::SessionExpired`].
    async fn open_stream(&self, request: &StreamRequest) -> Result<ByteStream, ClientError>;

    /// GET a JSON document
    async fn get_json(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<serde_json::Value, ClientError>;
}
