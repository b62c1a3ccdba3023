//! Chat coordinator: owns the session store and drives the completion client
//!
//! All session-state mutation happens on the coordinating task. The network
//! exchange runs on a spawned worker that only computes the result and hands
//! it back; the coordinator appends messages and writes the state file.

use crate::client::{CompletionClient, CompletionRequest, ConnectionReport};
use crate::config::{ClientConfig, Parameters};
use crate::error::{ConfigError, PersistenceError, RequestError};
use crate::session::{Message, SessionStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An explicitly owned chat session: conversation state, parameters, and
/// the request client
pub struct ChatSession {
    store: SessionStore,
    client: Arc<CompletionClient>,
    state_path: PathBuf,
    in_flight: Arc<AtomicBool>,
}

struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ChatSession {
    /// Restore a session from `state_path`, or start fresh
    ///
    /// A corrupt state file is logged and ignored; the in-memory defaults
    /// stay intact.
    pub async fn open(config: ClientConfig, state_path: PathBuf) -> crate::error::Result<Self> {
        let store = match SessionStore::load(&state_path).await {
            Ok(Some(store)) => {
                tracing::info!(
                    "restored {} messages from {}",
                    store.messages().len(),
                    state_path.display()
                );
                store
            }
            Ok(None) => SessionStore::default(),
            Err(e) => {
                tracing::warn!("ignoring unreadable session state: {}", e);
                SessionStore::default()
            }
        };

        let client = CompletionClient::new(config)?;
        Ok(Self {
            store,
            client: Arc::new(client),
            state_path,
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn parameters(&self) -> &Parameters {
        self.store.parameters()
    }

    pub fn config(&self) -> &ClientConfig {
        self.client.config()
    }

    /// Replace the parameter record wholesale
    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.store.set_parameters(parameters);
    }

    /// Update a single named parameter from its string form
    pub fn set_parameter(&mut self, field: &str, value: &str) -> Result<(), ConfigError> {
        self.store.parameters_mut().set(field, value)
    }

    /// Reset parameters to defaults, preserving the model selection
    pub fn reset_parameters(&mut self) {
        self.store.parameters_mut().reset();
    }

    /// Swap in a new client configuration
    pub fn reconfigure(&mut self, config: ClientConfig) -> Result<(), RequestError> {
        self.client = Arc::new(CompletionClient::new(config)?);
        Ok(())
    }

    /// Send one user message and return the assistant reply
    ///
    /// The user turn is appended before the network call, so a failed call
    /// still leaves the input recorded. The session is persisted after the
    /// exchange whether it succeeded or not; a save failure is logged, not
    /// propagated. Runs to completion once started.
    pub async fn send_message(&mut self, text: &str) -> Result<String, RequestError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RequestError::Validation {
                message: "Message is empty".to_string(),
            });
        }
        if self.store.parameters().model.trim().is_empty() {
            return Err(RequestError::Validation {
                message: "No model is configured".to_string(),
            });
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(RequestError::Busy);
        }
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        let system_prompt = self.store.parameters().system_prompt.clone();
        if !self.store.has_system_message() && !system_prompt.is_empty() {
            self.store.prepend_system(system_prompt);
        }
        self.store.append(Message::user(text));

        let request = CompletionRequest::new(self.store.parameters(), self.store.messages());
        let client = Arc::clone(&self.client);
        let result = match tokio::spawn(async move { client.complete(request).await }).await {
            Ok(result) => result,
            Err(e) => Err(RequestError::Transport {
                message: format!("request worker failed: {}", e),
            }),
        };

        if let Ok(reply) = &result {
            self.store.append(Message::assistant(reply.clone()));
        }
        self.autosave().await;
        result
    }

    /// Clear history; optionally keep the leading system message
    pub async fn clear(&mut self, preserve_system_prompt: bool) {
        self.store.clear(preserve_system_prompt);
        self.autosave().await;
    }

    /// Persist, then rebuild the session state from disk
    ///
    /// Parameters and history survive the round trip; an unreadable file
    /// keeps the in-memory state.
    pub async fn reload(&mut self) {
        self.autosave().await;
        match SessionStore::load(&self.state_path).await {
            Ok(Some(store)) => self.store = store,
            Ok(None) => {}
            Err(e) => tracing::warn!("keeping in-memory state, reload failed: {}", e),
        }
    }

    /// Persist the session to its state path
    pub async fn save(&self) -> Result<(), PersistenceError> {
        self.store.save(&self.state_path).await
    }

    /// Write a timestamped transcript file into `dir`
    pub async fn export_transcript(&self, dir: &Path) -> Result<PathBuf, PersistenceError> {
        self.store.export_transcript(dir).await
    }

    /// Connectivity probe with the current client settings
    pub async fn test_connection(&self) -> ConnectionReport {
        let config = self.client.config();
        CompletionClient::test_connection(&config.api_key, &config.base_url, config.debug).await
    }

    async fn autosave(&self) {
        if let Err(e) = self.save().await {
            tracing::error!("failed to persist session state: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DEBUG_REPLY;
    use crate::session::Role;
    use tempfile::tempdir;

    async fn debug_session(state_path: PathBuf) -> ChatSession {
        ChatSession::open(ClientConfig::default().with_debug(true), state_path)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_exchange_records_both_turns_and_persists() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("session.json");

        let mut session = debug_session(state_path.clone()).await;
        session.set_parameters(Parameters {
            model: "m".to_string(),
            max_tokens: 5,
            temperature: 0.7,
            top_p: 0.7,
            top_k: 50,
            frequency_penalty: 0.5,
            n: 1,
            stop: None,
            system_prompt: String::new(),
        });

        let reply = session.send_message("Hello").await.unwrap();
        assert_eq!(reply, DEBUG_REPLY);
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0], Message::user("Hello"));
        assert_eq!(session.messages()[1], Message::assistant(DEBUG_REPLY));

        let reloaded = SessionStore::load(&state_path).await.unwrap().unwrap();
        assert_eq!(reloaded.messages(), session.messages());
        assert_eq!(reloaded.parameters(), session.parameters());
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_before_any_side_effect() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("session.json");
        let mut session = debug_session(state_path.clone()).await;

        assert!(matches!(
            session.send_message("   ").await,
            Err(RequestError::Validation { .. })
        ));
        assert!(session.messages().is_empty());
        assert!(!state_path.exists());
    }

    #[tokio::test]
    async fn test_missing_model_is_rejected() {
        let dir = tempdir().unwrap();
        let mut session = debug_session(dir.path().join("session.json")).await;
        session.set_parameters(Parameters {
            model: String::new(),
            ..Parameters::default()
        });

        assert!(matches!(
            session.send_message("hi").await,
            Err(RequestError::Validation { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_prompt_is_prepended_once() {
        let dir = tempdir().unwrap();
        let mut session = debug_session(dir.path().join("session.json")).await;
        session.set_parameter("system_prompt", "be terse").unwrap();

        session.send_message("one").await.unwrap();
        session.send_message("two").await.unwrap();

        let messages = session.messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], Message::system("be terse"));
        let system_turns = messages.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(system_turns, 1);
    }

    #[tokio::test]
    async fn test_concurrent_submission_is_rejected() {
        let dir = tempdir().unwrap();
        let mut session = debug_session(dir.path().join("session.json")).await;

        session.in_flight.store(true, Ordering::SeqCst);
        assert!(matches!(
            session.send_message("hi").await,
            Err(RequestError::Busy)
        ));
        assert!(session.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_keeps_system_head_and_persists() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("session.json");
        let mut session = debug_session(state_path.clone()).await;
        session.set_parameter("system_prompt", "stay focused").unwrap();
        session.send_message("hello").await.unwrap();

        session.clear(true).await;

        assert_eq!(session.messages(), &[Message::system("stay focused")]);
        let reloaded = SessionStore::load(&state_path).await.unwrap().unwrap();
        assert_eq!(reloaded.messages(), session.messages());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_round_trips_state() {
        let dir = tempdir().unwrap();
        let mut session = debug_session(dir.path().join("session.json")).await;
        session.set_parameter("temperature", "1.3").unwrap();
        session.send_message("hello").await.unwrap();

        session.reload().await;

        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.parameters().temperature, 1.3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restoring_a_prior_session() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("session.json");

        {
            let mut session = debug_session(state_path.clone()).await;
            session.send_message("remember me").await.unwrap();
        }

        let restored = debug_session(state_path).await;
        assert_eq!(restored.messages().len(), 2);
        assert_eq!(restored.messages()[0], Message::user("remember me"));
    }
}
