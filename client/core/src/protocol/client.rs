//! Stream Protocol Client
//!
//! Opens an answer stream, feeds the body through a [`FrameDecoder`] and
//! hands each event to a [`StreamHandler`] in wire order.
//!
//! Cancellation is cooperative: the token is checked before every read and
//! before every dispatch, and a pending read is raced against it. Once the
//! token fires the handler hears nothing more, not even a completion.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::event::StreamEvent;
use super::framing::FrameDecoder;
use crate::error::ClientError;
use crate::transport::{StreamRequest, Transport};

/// Receives the events of one stream
///
/// For each stream exactly one of these happens after the events: one
/// `on_error`, one `on_complete`, or (on cancellation) nothing.
pub trait StreamHandler: Send + 'static {
    /// A decoded event, in wire order
    fn on_event(&mut self, event: StreamEvent);

    /// The request or the connection failed
    fn on_error(&mut self, error: ClientError);

    /// The body ended without a transport failure
    fn on_complete(&mut self);
}

/// How a stream ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The body was read to the end
    Completed,
    /// Opening or reading failed
    Failed,
    /// The token fired first
    Cancelled,
}

/// A running stream
#[derive(Debug)]
pub struct StreamSession {
    token: CancellationToken,
    task: JoinHandle<StreamOutcome>,
}

impl StreamSession {
    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the stream is still being read
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }

    /// Wait for the reader task to finish
    pub async fn join(self) -> StreamOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Stream task aborted");
                StreamOutcome::Failed
            }
        }
    }
}

/// Spawns stream readers on top of a [`Transport`]
pub struct StreamClient<T: Transport> {
    transport: Arc<T>,
}

impl<T: Transport> Clone for StreamClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> StreamClient<T> {
    /// Create a client over `transport`
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// The underlying transport
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Open a stream and read it on a background task
    pub fn open<H: StreamHandler>(
        &self,
        request: StreamRequest,
        mut handler: H,
        token: CancellationToken,
    ) -> StreamSession {
        let transport = Arc::clone(&self.transport);
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            run_stream(transport.as_ref(), request, &mut handler, &task_token).await
        });
        StreamSession { token, task }
    }

    /// Read a stream on the calling task until it ends or `token` fires
    pub async fn run<H: StreamHandler + ?Sized>(
        &self,
        request: StreamRequest,
        handler: &mut H,
        token: &CancellationToken,
    ) -> StreamOutcome {
        run_stream(self.transport.as_ref(), request, handler, token).await
    }
}

/// Read one stream to its end on the current task
pub async fn run_stream<T, H>(
    transport: &T,
    request: StreamRequest,
    handler: &mut H,
    token: &CancellationToken,
) -> StreamOutcome
where
    T: Transport + ?Sized,
    H: StreamHandler + ?Sized,
{
    if token.is_cancelled() {
        return StreamOutcome::Cancelled;
    }

    tracing::debug!(url = %request.url, "Opening answer stream");

    let opened = tokio::select! {
        biased;
        () = token.cancelled() => return StreamOutcome::Cancelled,
        opened = transport.open_stream(&request) => opened,
    };

    let mut body = match opened {
        Ok(body) => body,
        Err(e) => {
            if token.is_cancelled() {
                return StreamOutcome::Cancelled;
            }
            tracing::warn!(error = %e, "Failed to open answer stream");
            handler.on_error(e);
            return StreamOutcome::Failed;
        }
    };

    let mut decoder = FrameDecoder::new();

    loop {
        if token.is_cancelled() {
            tracing::debug!("Answer stream cancelled");
            return StreamOutcome::Cancelled;
        }

        let next = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!("Answer stream cancelled during read");
                return StreamOutcome::Cancelled;
            }
            next = body.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                for event in decoder.push(&chunk) {
                    if token.is_cancelled() {
                        return StreamOutcome::Cancelled;
                    }
                    tracing::trace!(kind = event.kind(), "Stream event");
                    handler.on_event(event);
                }
            }
            Some(Err(e)) => {
                if token.is_cancelled() {
                    return StreamOutcome::Cancelled;
                }
                tracing::warn!(error = %e, "Answer stream failed");
                handler.on_error(e);
                return StreamOutcome::Failed;
            }
            None => {
                decoder.finish();
                if token.is_cancelled() {
                    return StreamOutcome::Cancelled;
                }
                tracing::debug!(
                    frames = decoder.frames_decoded(),
                    dropped = decoder.frames_dropped(),
                    "Answer stream ended"
                );
                handler.on_complete();
                return StreamOutcome::Completed;
            }
        }
    }
}
