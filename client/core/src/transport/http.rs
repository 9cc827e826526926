//! HTTP transport backed by `reqwest`

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use super::{ByteStream, StreamRequest, Transport};
use crate::error::ClientError;

/// `reqwest`-based transport
///
/// Only a connect timeout is set. A stream that stalls without closing stays
/// open until the caller cancels it.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the given connect timeout
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(connect_timeout: Duration) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { http_client })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::SessionExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open_stream(&self, request: &StreamRequest) -> Result<ByteStream, ClientError> {
        let mut builder = self
            .http_client
            .post(&request.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request.body);
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = Self::check_status(builder.send().await?).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ClientError::from))
            .boxed())
    }

    async fn get_json(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<serde_json::Value, ClientError> {
        let mut builder = self.http_client.get(url);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = Self::check_status(builder.send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}
