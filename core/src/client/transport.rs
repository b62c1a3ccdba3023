//! HTTP transport for the completion endpoint

use crate::client::protocol::{CompletionRequest, ProbeRequest};
use crate::error::RequestError;
use async_trait::async_trait;
use std::time::Duration;

/// Raw response handed back by a transport
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Failure classes a transport can report
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFailure {
    /// Connection could not be established; retryable
    Connect(String),

    /// The request timed out; retryable
    Timeout(String),

    /// Proxy misconfiguration; never retried
    Proxy(String),

    /// Any other request failure; never retried
    Other(String),
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportFailure::Connect(message) => write!(f, "connection error: {}", message),
            TransportFailure::Timeout(message) => write!(f, "request timed out: {}", message),
            TransportFailure::Proxy(message) => write!(f, "proxy error: {}", message),
            TransportFailure::Other(message) => write!(f, "request error: {}", message),
        }
    }
}

/// Seam between the retry logic and the network
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Post a completion request and return the raw status and body
    async fn execute(
        &self,
        request: &CompletionRequest,
    ) -> Result<TransportResponse, TransportFailure>;
}

/// reqwest-backed transport with a direct connection and a fixed timeout
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpTransport {
    /// Build a transport for `{base_url}/chat/completions`
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| RequestError::Transport {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    async fn post<B: serde::Serialize>(
        &self,
        body: &B,
    ) -> Result<TransportResponse, TransportFailure> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;

        tracing::debug!("completion endpoint answered with status {}", status);
        Ok(TransportResponse { status, body })
    }

    /// One-token probe used by the connectivity test
    pub(crate) async fn probe(
        &self,
        request: &ProbeRequest,
    ) -> Result<TransportResponse, TransportFailure> {
        self.post(request).await
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn execute(
        &self,
        request: &CompletionRequest,
    ) -> Result<TransportResponse, TransportFailure> {
        self.post(request).await
    }
}

fn classify(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportFailure::Connect(err.to_string())
    } else if mentions_proxy(&err) {
        TransportFailure::Proxy(err.to_string())
    } else {
        TransportFailure::Other(err.to_string())
    }
}

// reqwest has no proxy-error predicate; scan the source chain instead.
fn mentions_proxy(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if e.to_string().to_lowercase().contains("proxy") {
            return true;
        }
        current = e.source();
    }
    false
}
