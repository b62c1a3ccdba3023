//! Request parameters, client configuration, and well-known file locations

use crate::error::{ConfigError, PersistenceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default completion endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/v1";

fn default_model() -> String {
    "deepseek-ai/DeepSeek-V2.5".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.7
}

fn default_top_k() -> u32 {
    50
}

fn default_frequency_penalty() -> f32 {
    0.5
}

fn default_n() -> u32 {
    1
}

/// Stop sequences accepted by the endpoint: a single string or a list of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

/// Generation-control parameters sent with every completion request
///
/// Every field falls back to its default when missing from a persisted
/// session, so a partially written file never produces a half-populated
/// record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for sampling (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Top-p sampling parameter (0.0 to 1.0)
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Top-k sampling parameter
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Frequency penalty
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,

    /// Number of completions requested
    #[serde(default = "default_n")]
    pub n: u32,

    /// Stop sequences, omitted from the request when unset
    #[serde(default)]
    pub stop: Option<StopSequences>,

    /// System prompt prepended to a fresh conversation, may be empty
    #[serde(default)]
    pub system_prompt: String,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            frequency_penalty: default_frequency_penalty(),
            n: default_n(),
            stop: None,
            system_prompt: String::new(),
        }
    }
}

impl Parameters {
    /// Validate the parameter record
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "model".to_string(),
                value: self.model.clone(),
            });
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_tokens".to_string(),
                value: self.max_tokens.to_string(),
            });
        }
        if self.n == 0 {
            return Err(ConfigError::InvalidValue {
                field: "n".to_string(),
                value: self.n.to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "temperature".to_string(),
                value: self.temperature.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::InvalidValue {
                field: "top_p".to_string(),
                value: self.top_p.to_string(),
            });
        }
        Ok(())
    }

    /// Update a single named field from its string form
    ///
    /// An empty `stop` value clears the stop sequences; a comma-separated
    /// value becomes a list. The update is applied only when the resulting
    /// record validates.
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), ConfigError> {
        let mut updated = self.clone();
        match field {
            "model" => updated.model = value.to_string(),
            "max_tokens" => updated.max_tokens = parse_field(field, value)?,
            "temperature" => updated.temperature = parse_field(field, value)?,
            "top_p" => updated.top_p = parse_field(field, value)?,
            "top_k" => updated.top_k = parse_field(field, value)?,
            "frequency_penalty" => updated.frequency_penalty = parse_field(field, value)?,
            "n" => updated.n = parse_field(field, value)?,
            "stop" => updated.stop = parse_stop(value),
            "system_prompt" => updated.system_prompt = value.to_string(),
            _ => {
                return Err(ConfigError::UnknownField {
                    field: field.to_string(),
                })
            }
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Restore all defaults, preserving the current model selection
    pub fn reset(&mut self) {
        let model = std::mem::take(&mut self.model);
        *self = Parameters::default();
        self.model = model;
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_stop(value: &str) -> Option<StopSequences> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else if value.contains(',') {
        Some(StopSequences::Many(
            value.split(',').map(|s| s.trim().to_string()).collect(),
        ))
    } else {
        Some(StopSequences::One(value.to_string()))
    }
}

/// Connection settings for the completion client
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer token for the endpoint
    pub api_key: String,

    /// Endpoint base URL
    pub base_url: String,

    /// When set, no network call is made and a canned reply is returned
    pub debug: bool,

    /// Retry budget for transient network failures
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            debug: false,
            max_retries: 3,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the default endpoint
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Set the endpoint base URL
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Toggle debug mode
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

// The API key stays out of debug output.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("debug", &self.debug)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Directory holding the session state and credential files
pub fn default_state_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("natter")
}

/// Default location of the persisted session
pub fn default_session_path() -> PathBuf {
    default_state_dir().join("session.json")
}

/// Default location of the saved API key
pub fn default_api_key_path() -> PathBuf {
    default_state_dir().join("api_key.txt")
}

/// Read the saved API key, if any
pub async fn load_api_key(path: &Path) -> Option<String> {
    match fs::read_to_string(path).await {
        Ok(contents) => {
            let key = contents.trim().to_string();
            (!key.is_empty()).then_some(key)
        }
        Err(e) => {
            tracing::debug!("no saved API key at {}: {}", path.display(), e);
            None
        }
    }
}

/// Write the API key to the credential file
pub async fn save_api_key(path: &Path, key: &str) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PersistenceError::Save {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
    }
    fs::write(path, key)
        .await
        .map_err(|e| PersistenceError::Save {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}
