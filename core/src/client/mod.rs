//! Completion request client: payload building, retries, response normalization

pub mod protocol;
pub mod transport;

pub use protocol::CompletionRequest;
pub use transport::{CompletionTransport, HttpTransport, TransportFailure, TransportResponse};

use crate::config::{ClientConfig, Parameters};
use crate::error::RequestError;
use protocol::{extract_assistant_text, extract_error_message, ProbeRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Canned assistant reply returned in debug mode
pub const DEBUG_REPLY: &str =
    "This is a canned debug-mode reply. Disable debug mode to reach the live endpoint.";

/// Simulated latency before the canned debug reply
const DEBUG_DELAY: Duration = Duration::from_secs(1);

/// Timeout for completion requests
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for the connectivity probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a connectivity test
#[derive(Debug, Clone)]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
}

/// Client for the remote completion endpoint
///
/// Transient network failures (connection establishment, timeout) are
/// retried with exponential backoff up to the configured budget. HTTP
/// error statuses and proxy failures fail immediately.
pub struct CompletionClient {
    config: ClientConfig,
    transport: Arc<dyn CompletionTransport>,
}

impl CompletionClient {
    /// Create a client backed by the HTTP transport
    pub fn new(config: ClientConfig) -> Result<Self, RequestError> {
        let transport = HttpTransport::new(&config.base_url, &config.api_key, SEND_TIMEOUT)?;
        Ok(Self {
            config,
            transport: Arc::new(transport),
        })
    }

    /// Create a client with a custom transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn CompletionTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issue a completion request and return the normalized assistant text
    pub async fn complete(&self, request: CompletionRequest) -> Result<String, RequestError> {
        if self.config.debug {
            sleep(DEBUG_DELAY).await;
            return Ok(DEBUG_REPLY.to_string());
        }

        if self.config.api_key.trim().is_empty() {
            return Err(RequestError::Validation {
                message: "API key is not configured".to_string(),
            });
        }

        let mut retries = 0;
        loop {
            let failure = match self.transport.execute(&request).await {
                Ok(response) => return interpret(response),
                Err(failure) => failure,
            };

            match failure {
                TransportFailure::Connect(message) | TransportFailure::Timeout(message) => {
                    if retries >= self.config.max_retries {
                        return Err(RequestError::Transient {
                            message,
                            attempts: retries + 1,
                        });
                    }
                    retries += 1;
                    let delay = backoff_delay(retries);
                    tracing::warn!(
                        "transient network failure, retry {}/{} in {}s: {}",
                        retries,
                        self.config.max_retries,
                        delay.as_secs(),
                        message
                    );
                    sleep(delay).await;
                }
                TransportFailure::Proxy(message) => {
                    return Err(RequestError::Proxy { message })
                }
                TransportFailure::Other(message) => {
                    return Err(RequestError::Transport { message })
                }
            }
        }
    }

    /// Probe the endpoint with a one-token request
    ///
    /// Uses its own short-lived transport with a tighter timeout and never
    /// touches any session state.
    pub async fn test_connection(api_key: &str, base_url: &str, debug: bool) -> ConnectionReport {
        if debug {
            return ConnectionReport {
                success: true,
                message: "Debug mode enabled, connection test skipped".to_string(),
            };
        }
        if api_key.trim().is_empty() {
            return ConnectionReport {
                success: false,
                message: "An API key is required unless debug mode is enabled".to_string(),
            };
        }

        let transport = match HttpTransport::new(base_url, api_key, PROBE_TIMEOUT) {
            Ok(transport) => transport,
            Err(e) => {
                return ConnectionReport {
                    success: false,
                    message: e.to_string(),
                }
            }
        };

        let request = ProbeRequest::new(&Parameters::default().model);
        match transport.probe(&request).await {
            Ok(response) if (200..300).contains(&response.status) => ConnectionReport {
                success: true,
                message: format!("Connection succeeded with status {}", response.status),
            },
            Ok(response) => ConnectionReport {
                success: false,
                message: format!(
                    "API error {}: {}",
                    response.status,
                    extract_error_message(response.status, &response.body)
                ),
            },
            Err(failure) => ConnectionReport {
                success: false,
                message: format!("Connection failed: {}", failure),
            },
        }
    }
}

fn interpret(response: TransportResponse) -> Result<String, RequestError> {
    if !(200..300).contains(&response.status) {
        return Err(RequestError::Status {
            status: response.status,
            message: extract_error_message(response.status, &response.body),
        });
    }
    extract_assistant_text(&response.body)
}

/// Delay before retry number `retries` (counter starts at 1): 2^retries seconds
fn backoff_delay(retries: u32) -> Duration {
    Duration::from_secs(1u64 << retries.min(16))
}
