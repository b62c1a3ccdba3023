//! Durable storage for the conversation and its parameters

use crate::config::Parameters;
use crate::error::PersistenceError;
use crate::session::{Message, Role};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Owns the ordered message log and the request parameters
///
/// The message sequence is append-only during a session except for an
/// explicit [`clear`](SessionStore::clear). A system message, when present,
/// is the head element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStore {
    parameters: Parameters,
    messages: Vec<Message>,
}

/// On-disk session document
///
/// Both fields default independently so a partial document loads without
/// losing the rest.
#[derive(Serialize, Deserialize)]
struct PersistedSession {
    #[serde(default)]
    parameters: Parameters,
    #[serde(default)]
    messages: Vec<Message>,
}

impl SessionStore {
    /// Create an empty store with the given parameters
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            messages: Vec::new(),
        }
    }

    /// The ordered message log
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The current request parameters
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Mutable access to the request parameters
    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Replace the parameter record wholesale
    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    /// Append a message to the log
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether the log already contains a system message
    pub fn has_system_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::System)
    }

    /// Insert a system message at the head of the log
    pub fn prepend_system<S: Into<String>>(&mut self, content: S) {
        self.messages.insert(0, Message::system(content));
    }

    /// Empty the message log
    ///
    /// When `preserve_system_prompt` is set and a system message exists,
    /// exactly that one message is re-added as the new head.
    pub fn clear(&mut self, preserve_system_prompt: bool) {
        let system = preserve_system_prompt
            .then(|| self.messages.iter().find(|m| m.role == Role::System).cloned())
            .flatten();
        self.messages.clear();
        if let Some(message) = system {
            self.messages.push(message);
        }
    }

    /// Serialize `{parameters, messages}` to `path` as pretty JSON
    pub async fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let save_error = |message: String| PersistenceError::Save {
            path: path.display().to_string(),
            message,
        };

        let document = PersistedSession {
            parameters: self.parameters.clone(),
            messages: self.messages.clone(),
        };
        let json = serde_json::to_string_pretty(&document).map_err(|e| save_error(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| save_error(e.to_string()))?;
        }
        fs::write(path, json)
            .await
            .map_err(|e| save_error(e.to_string()))?;

        tracing::debug!("saved {} messages to {}", self.messages.len(), path.display());
        Ok(())
    }

    /// Deserialize a store from `path`
    ///
    /// A missing file is `Ok(None)`; an unreadable or corrupt file is an
    /// error, leaving the caller's in-memory state untouched.
    pub async fn load(path: &Path) -> Result<Option<Self>, PersistenceError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PersistenceError::Load {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let document: PersistedSession =
            serde_json::from_str(&content).map_err(|_| PersistenceError::InvalidFormat {
                path: path.display().to_string(),
            })?;

        Ok(Some(Self {
            parameters: document.parameters,
            messages: document.messages,
        }))
    }

    /// Write a timestamp-named plain-text transcript into `dir`
    ///
    /// One block per message: `"{role label}:\n{content}\n\n"`.
    pub async fn export_transcript(&self, dir: &Path) -> Result<PathBuf, PersistenceError> {
        let filename = format!("chat_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(filename);
        let export_error = |message: String| PersistenceError::Export {
            path: path.display().to_string(),
            message,
        };

        let mut transcript = String::new();
        for message in &self.messages {
            transcript.push_str(&format!("{}:\n{}\n\n", message.role.label(), message.content));
        }

        fs::create_dir_all(dir)
            .await
            .map_err(|e| export_error(e.to_string()))?;
        fs::write(&path, transcript)
            .await
            .map_err(|e| export_error(e.to_string()))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn populated_store() -> SessionStore {
        let mut store = SessionStore::default();
        store.prepend_system("be helpful");
        store.append(Message::user("hello"));
        store.append(Message::assistant("hi there"));
        store
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("session.json");

        let mut store = populated_store();
        store.parameters_mut().set("temperature", "1.2").unwrap();
        store.save(&path).await.unwrap();

        let loaded = SessionStore::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.messages().len(), 3);
        assert_eq!(loaded.parameters().temperature, 1.2);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let loaded = SessionStore::load(&dir.path().join("absent.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "not json at all {{{").await.unwrap();

        assert!(matches!(
            SessionStore::load(&path).await,
            Err(PersistenceError::InvalidFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_partial_document_uses_default_parameters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(
            &path,
            r#"{"messages": [{"role": "user", "content": "hi"}]}"#,
        )
        .await
        .unwrap();

        let loaded = SessionStore::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded.messages().len(), 1);
        assert_eq!(*loaded.parameters(), Parameters::default());
    }

    #[test]
    fn test_clear_preserving_system_is_idempotent() {
        let mut store = populated_store();
        store.append(Message::user("more"));
        store.append(Message::assistant("turns"));

        store.clear(true);
        assert_eq!(store.messages(), &[Message::system("be helpful")]);

        store.clear(true);
        assert_eq!(store.messages(), &[Message::system("be helpful")]);
    }

    #[test]
    fn test_clear_dropping_system() {
        let mut store = populated_store();
        store.clear(false);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_without_system_message() {
        let mut store = SessionStore::default();
        store.append(Message::user("hello"));
        store.clear(true);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_export_transcript_format() {
        let dir = tempdir().unwrap();
        let store = populated_store();

        let path = store.export_transcript(dir.path()).await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();

        assert_eq!(
            contents,
            "System:\nbe helpful\n\nYou:\nhello\n\nAI:\nhi there\n\n"
        );
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("chat_") && name.ends_with(".txt"));
    }
}
