//! Wire format for the completion endpoint

use crate::config::{Parameters, StopSequences};
use crate::error::RequestError;
use crate::session::Message;
use serde::{Deserialize, Serialize};

/// JSON payload for `POST {base_url}/chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    pub top_p: f32,
    pub top_k: u32,
    pub frequency_penalty: f32,
    pub n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
}

impl CompletionRequest {
    /// Build the payload for the current conversation and parameters
    pub fn new(parameters: &Parameters, messages: &[Message]) -> Self {
        Self {
            model: parameters.model.clone(),
            messages: messages.to_vec(),
            temperature: parameters.temperature,
            max_tokens: parameters.max_tokens,
            stream: false,
            top_p: parameters.top_p,
            top_k: parameters.top_k,
            frequency_penalty: parameters.frequency_penalty,
            n: parameters.n,
            stop: parameters.stop.clone(),
        }
    }
}

/// Minimal one-token request used by the connectivity test
#[derive(Debug, Serialize)]
pub(crate) struct ProbeRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub stream: bool,
}

impl ProbeRequest {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![Message::user("Hello")],
            max_tokens: 5,
            stream: false,
        }
    }
}

/// Response envelope returned by the endpoint
#[derive(Debug, Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<Choice>,
}

/// The shapes a choice is known to take, tried in order
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Choice {
    /// Canonical chat shape: `{"message": {"content": ...}}`
    Chat { message: ChatTurn },

    /// Older text-completion shape: `{"text": ...}`
    Legacy { text: String },

    /// Anything else is kept verbatim and stringified
    Opaque(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct ChatTurn {
    content: String,
}

/// Structured error body some endpoints attach to non-2xx statuses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull the assistant text out of a successful response body
///
/// A body with no usable `choices` entry is a parse failure carrying the
/// raw response, so the exchange is never silently dropped.
pub(crate) fn extract_assistant_text(body: &str) -> Result<String, RequestError> {
    let reply: CompletionReply =
        serde_json::from_str(body).map_err(|_| RequestError::Parse {
            raw: body.to_string(),
        })?;

    let Some(choice) = reply.choices.into_iter().next() else {
        return Err(RequestError::Parse {
            raw: body.to_string(),
        });
    };

    Ok(match choice {
        Choice::Chat { message } => message.content,
        Choice::Legacy { text } => text,
        Choice::Opaque(value) => value.to_string(),
    })
}

/// Best-effort error message for a non-2xx response
pub(crate) fn extract_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_canonical_shape() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "hi"}}]}"#;
        assert_eq!(extract_assistant_text(body).unwrap(), "hi");
    }

    #[test]
    fn test_extract_legacy_text_shape() {
        let body = r#"{"choices": [{"text": "hi"}]}"#;
        assert_eq!(extract_assistant_text(body).unwrap(), "hi");
    }

    #[test]
    fn test_extract_stringifies_unknown_choice() {
        let body = r#"{"choices": [{"delta": {"content": "hi"}}]}"#;
        let text = extract_assistant_text(body).unwrap();
        assert!(text.contains("delta"));
    }

    #[test]
    fn test_empty_choices_is_parse_error_with_raw_body() {
        let body = r#"{"choices": []}"#;
        match extract_assistant_text(body) {
            Err(RequestError::Parse { raw }) => assert_eq!(raw, body),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_json_body_is_parse_error() {
        assert!(matches!(
            extract_assistant_text("<html>gateway</html>"),
            Err(RequestError::Parse { .. })
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"message": "invalid api key"}}"#;
        assert_eq!(extract_error_message(401, body), "invalid api key");

        assert_eq!(extract_error_message(502, "bad gateway"), "bad gateway");
        assert_eq!(extract_error_message(500, ""), "HTTP 500");
    }

    #[test]
    fn test_request_serialization() {
        let params = Parameters::default();
        let request = CompletionRequest::new(&params, &[Message::user("hi")]);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], json!("deepseek-ai/DeepSeek-V2.5"));
        assert_eq!(value["stream"], json!(false));
        assert_eq!(value["max_tokens"], json!(512));
        assert_eq!(value["n"], json!(1));
        assert_eq!(value["messages"], json!([{"role": "user", "content": "hi"}]));
        // stop is omitted entirely when unset
        assert!(value.get("stop").is_none());
    }

    #[test]
    fn test_request_serializes_stop_when_set() {
        let mut params = Parameters::default();
        params.set("stop", "END").unwrap();
        let request = CompletionRequest::new(&params, &[]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stop"], json!("END"));
    }

    #[test]
    fn test_probe_request_shape() {
        let value = serde_json::to_value(ProbeRequest::new("m")).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "m",
                "messages": [{"role": "user", "content": "Hello"}],
                "max_tokens": 5,
                "stream": false
            })
        );
    }
}
