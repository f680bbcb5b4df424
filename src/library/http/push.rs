use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Errors which prevent a response from being received
#[derive(Debug, Error)]
pub enum PushError {
    /// Request could not be built or the client could not be initialized
    #[error("invalid push request")]
    InvalidRequest(#[source] reqwest::Error),
    /// Connection failed, timed out, or the body could not be read
    #[error("push transport failed")]
    Transport(#[source] reqwest::Error),
}

/// Status and body returned by the receiving end of a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body decoded as text
    pub body: String,
}

impl PushResponse {
    /// Whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client that delivers serialized payloads to a remote endpoint
#[async_trait]
pub trait PushClient: Send + Sync {
    /// Sends the payload as a POST request and waits for the response
    async fn push(&self, url: &str, payload: Vec<u8>) -> Result<PushResponse, PushError>;
}

/// [`PushClient`] implementation using [`reqwest`]
///
/// Each request, including reading the body, is bounded by the timeout passed at creation.
#[derive(Clone)]
pub struct ReqwestPushClient {
    client: Client,
}

impl ReqwestPushClient {
    /// Creates a new client with a per-request timeout
    pub fn new(request_timeout: Duration) -> Result<Self, PushError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(PushError::InvalidRequest)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PushClient for ReqwestPushClient {
    async fn push(&self, url: &str, payload: Vec<u8>) -> Result<PushResponse, PushError> {
        trace!(url, bytes = payload.len(), "Sending push request");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    PushError::InvalidRequest(e)
                } else {
                    PushError::Transport(e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(PushError::Transport)?;

        Ok(PushResponse { status, body })
    }
}
