//! Credential Renewal
//!
//! The network side of renewal. The manager decides *when* to renew and makes
//! sure only one renewal runs at a time; a renewer only knows *how*.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::RenewalError;

/// A freshly issued credential as reported by the credential service
#[derive(Clone, Deserialize)]
pub struct RenewedCredential {
    /// New access token
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    /// Rotated refresh token, when the service issues one
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for RenewedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewedCredential")
            .field("expires_in", &self.expires_in)
            .field("rotated", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Performs one renewal call
#[async_trait]
pub trait CredentialRenewer: Send + Sync {
    /// Ask the credential service for a new access credential
    async fn renew(&self) -> Result<RenewedCredential, RenewalError>;
}

/// Renews against the service's refresh endpoint
///
/// Posts an empty body when the session is carried out-of-band (e.g. by a
/// cookie), or `{"refresh_token": ...}` once a refresh token is known.
pub struct HttpCredentialRenewer {
    url: String,
    http_client: reqwest::Client,
    refresh_token: Mutex<Option<String>>,
}

impl HttpCredentialRenewer {
    /// Create a renewer for the given refresh URL
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Result<Self, RenewalError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| RenewalError::Transport(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http_client,
            refresh_token: Mutex::new(None),
        })
    }

    /// Use a refresh token for subsequent renewals
    #[must_use]
    pub fn with_refresh_token(self, token: impl Into<String>) -> Self {
        *self.refresh_token.lock() = Some(token.into());
        self
    }
}

#[async_trait]
impl CredentialRenewer for HttpCredentialRenewer {
    async fn renew(&self) -> Result<RenewedCredential, RenewalError> {
        let refresh_token = self.refresh_token.lock().clone();

        let mut request = self.http_client.post(&self.url);
        if let Some(token) = refresh_token {
            request = request.json(&serde_json::json!({ "refresh_token": token }));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RenewalError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RenewalError::Rejected {
                status: response.status().as_u16(),
            });
        }

        let renewed: RenewedCredential = response
            .json()
            .await
            .map_err(|e| RenewalError::InvalidResponse(e.to_string()))?;

        if renewed.access_token.is_empty() {
            return Err(RenewalError::InvalidResponse(
                "empty access_token".to_string(),
            ));
        }

        if let Some(ref rotated) = renewed.refresh_token {
            *self.refresh_token.lock() = Some(rotated.clone());
        }

        Ok(renewed)
    }
}
