//! In-memory transport for unit tests

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{ByteStream, StreamRequest, Transport};
use crate::error::ClientError;

pub(crate) type ChunkSender = mpsc::UnboundedSender<Result<Vec<u8>, ClientError>>;

/// What the next `open_stream` call returns
pub(crate) enum Scripted {
    /// A finite body delivered as these chunks
    Chunks(Vec<Vec<u8>>),
    /// A body fed by the test through a [`ChunkSender`]
    Live(mpsc::UnboundedReceiver<Result<Vec<u8>, ClientError>>),
    /// Fail to open with this status (401 maps to session expiry)
    Status(u16),
}

/// Transport that replays scripted responses in order
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<StreamRequest>>,
    history: Mutex<Option<serde_json::Value>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a finite body
    pub fn push_frames<S: AsRef<str>>(&self, frames: &[S]) {
        let chunks = frames.iter().map(|f| f.as_ref().as_bytes().to_vec()).collect();
        self.responses.lock().push_back(Scripted::Chunks(chunks));
    }

    /// Queue a body the test feeds by hand
    pub fn push_live(&self) -> ChunkSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.responses.lock().push_back(Scripted::Live(rx));
        tx
    }

    /// Queue an open failure
    pub fn push_status(&self, status: u16) {
        self.responses.lock().push_back(Scripted::Status(status));
    }

    /// Set the document returned by `get_json`
    pub fn set_history(&self, value: serde_json::Value) {
        *self.history.lock() = Some(value);
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().clone()
    }
}

/// Format one `data:` frame
pub(crate) fn frame(json: &str) -> String {
    format!("data: {json}\n\n")
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open_stream(&self, request: &StreamRequest) -> Result<ByteStream, ClientError> {
        self.requests.lock().push(request.clone());
        let next = self.responses.lock().pop_front();

        match next {
            Some(Scripted::Chunks(chunks)) => {
                Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
            }
            Some(Scripted::Live(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            Some(Scripted::Status(401)) => Err(ClientError::SessionExpired),
            Some(Scripted::Status(status)) => Err(ClientError::Status {
                status,
                body: String::new(),
            }),
            None => Err(ClientError::Decode("no scripted response".to_string())),
        }
    }

    async fn get_json(
        &self,
        _url: &str,
        _bearer: Option<&str>,
    ) -> Result<serde_json::Value, ClientError> {
        self.history.lock().clone().ok_or(ClientError::Status {
            status: 404,
            body: "not found".to_string(),
        })
    }
}
