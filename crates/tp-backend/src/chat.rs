//! HTTP client for the planning chat service.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tp_protocol::{ChatRequest, ChatResponse, SessionId};
use tracing::{error, info};

use crate::ingest::{ingest, StreamHandler, TransportError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:20001";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(e))
    }
}

/// Chat service client.
///
/// Streaming requests carry no overall timeout; callers that want a deadline
/// race [`ChatClient::stream_chat`] against a timer and drop it on expiry.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    request_timeout: Duration,
    http: Client,
}

impl ChatClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChatError> {
        Self::with_timeouts(base_url, CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    /// Create a client with explicit timeouts. `request_timeout` applies to
    /// the non-streaming endpoint only.
    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ChatError> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(2)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a prompt and wait for the whole answer.
    pub async fn send_chat_message(
        &self,
        session_id: &SessionId,
        input: &str,
    ) -> Result<ChatResponse, ChatError> {
        let body = ChatRequest::new(session_id.clone(), input);
        let response = self
            .http
            .post(self.endpoint("/chat"))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn open_stream(
        &self,
        session_id: &SessionId,
        input: &str,
    ) -> Result<reqwest::Response, TransportError> {
        let body = ChatRequest::new(session_id.clone(), input);
        let response = self
            .http
            .post(self.endpoint("/chat/stream"))
            .json(&body)
            .send()
            .await?;
        check_status(response).await
    }

    /// Send a prompt and stream the answer into `handler`.
    ///
    /// Failing to open the stream is reported through `on_error` like any
    /// other transport failure.
    pub async fn stream_chat<H: StreamHandler>(
        &self,
        session_id: &SessionId,
        input: &str,
        mut handler: H,
    ) {
        let response = match self.open_stream(session_id, input).await {
            Ok(response) => response,
            Err(e) => {
                error!(session = %session_id, error = %e, "failed to open chat stream");
                handler.on_error(e);
                return;
            }
        };

        info!(session = %session_id, status = %response.status(), "chat stream opened");
        ingest(response.bytes_stream(), handler).await;
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}
