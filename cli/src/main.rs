//! # natter CLI
//!
//! Line-oriented chat client for LLM completion endpoints.
//!
//! ## Usage
//!
//! - `natter` - Start a chat session (state restored from the last run)
//! - `natter --debug` - Chat offline against canned replies
//! - `natter --model <name>` - Override the model for this session
//!
//! Inside the session, plain lines are sent to the endpoint and slash
//! commands (`/help`) drive parameters, connectivity tests, clearing,
//! saving, and export.

use anyhow::Result;
use clap::Parser;
use natter_core::{config, ChatSession, ClientConfig};
use std::path::PathBuf;

mod repl;

/// natter - chat with an LLM completion endpoint from the terminal
#[derive(Parser)]
#[command(name = "natter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat with an LLM completion endpoint from the terminal")]
struct Cli {
    /// API key (falls back to the saved credential file)
    #[arg(long, env = "NATTER_API_KEY")]
    api_key: Option<String>,

    /// Completion endpoint base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Model override for this session
    #[arg(long)]
    model: Option<String>,

    /// Run offline: no network calls, canned replies
    #[arg(short, long)]
    debug: bool,

    /// Retry budget for transient network failures
    #[arg(long)]
    max_retries: Option<u32>,

    /// Session state file
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Credential file holding the API key
    #[arg(long)]
    api_key_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    natter_core::init_tracing_with_debug(cli.verbose);

    let api_key_path = cli
        .api_key_file
        .unwrap_or_else(config::default_api_key_path);
    let state_path = cli.state_file.unwrap_or_else(config::default_session_path);

    let api_key = match cli.api_key {
        Some(key) => key,
        None => config::load_api_key(&api_key_path).await.unwrap_or_default(),
    };

    let mut client_config = ClientConfig::new(api_key).with_debug(cli.debug);
    if let Some(base_url) = cli.base_url {
        client_config = client_config.with_base_url(base_url);
    }
    if let Some(max_retries) = cli.max_retries {
        client_config = client_config.with_max_retries(max_retries);
    }

    let mut session = ChatSession::open(client_config, state_path).await?;
    if let Some(model) = cli.model {
        session.set_parameter("model", &model)?;
    }

    repl::run(&mut session).await?;

    if let Err(e) = session.save().await {
        tracing::error!("failed to save session at shutdown: {}", e);
    }
    let key = session.config().api_key.clone();
    if !key.is_empty() {
        if let Err(e) = config::save_api_key(&api_key_path, &key).await {
            tracing::error!("failed to save API key: {}", e);
        }
    }

    Ok(())
}
