//! Error types and handling for the natter core

use thiserror::Error;

/// Result type alias for natter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the natter core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Completion request errors
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Session persistence errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by a completion request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    /// Input rejected before any network activity
    #[error("Invalid request: {message}")]
    Validation { message: String },

    /// Connection or timeout failure that survived the retry budget
    #[error("Network failure after {attempts} attempts: {message}")]
    Transient { message: String, attempts: u32 },

    /// Proxy misconfiguration, failed without retrying
    #[error("Proxy error: {message}. Check your network settings or disable the proxy")]
    Proxy { message: String },

    /// Non-2xx response from the endpoint, failed without retrying
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not match any recognized completion shape
    #[error("Unrecognized completion response: {raw}")]
    Parse { raw: String },

    /// Any other request failure
    #[error("Request failed: {message}")]
    Transport { message: String },

    /// A second submission while a request is still running
    #[error("A request is already in flight for this session")]
    Busy,
}

/// Session persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to save session to {path}: {message}")]
    Save { path: String, message: String },

    #[error("Failed to load session from {path}: {message}")]
    Load { path: String, message: String },

    #[error("Session file {path} does not contain a valid saved session")]
    InvalidFormat { path: String },

    #[error("Failed to export transcript to {path}: {message}")]
    Export { path: String, message: String },
}

/// Parameter and client configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("Unknown parameter field: {field}")]
    UnknownField { field: String },
}
