//! # natter core
//!
//! Core library for natter, a small chat client for LLM completion
//! endpoints. It owns the two halves the UI layer drives: the durable
//! conversation state (messages + request parameters) and the completion
//! request client (payload building, retry with exponential backoff,
//! response normalization).

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod session;

// Re-export commonly used types
pub use chat::ChatSession;
pub use client::{CompletionClient, ConnectionReport, DEBUG_REPLY};
pub use config::{ClientConfig, Parameters, StopSequences};
pub use error::{ConfigError, Error, PersistenceError, RequestError, Result};
pub use session::{Message, Role, SessionStore};

/// Current version of the natter-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the library
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a specific debug mode
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}
