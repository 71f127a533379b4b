//! Chat-completion model abstraction
//!
//! The analyzer talks to the model only through [`ChatModel`], so tests can
//! script replies without network access.

pub mod openai;
pub mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use xpi_common::Message;

pub use openai::OpenAiChatModel;

/// Chat model errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Chat model not configured")]
    NotConfigured,
}

/// JSON schema the reply must follow
#[derive(Debug, Clone)]
pub struct OutputSchema {
    /// Schema name sent to the API (letters, digits, underscores)
    pub name: &'static str,
    pub schema: serde_json::Value,
}

/// One structured-output request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub schema: OutputSchema,
}

/// Hosted chat-completion model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the raw text of the first reply
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;
}

/// Stand-in used when no API key is configured; every call fails so the
/// analyzer takes its fallback paths
#[derive(Debug, Default)]
pub struct UnconfiguredModel;

#[async_trait]
impl ChatModel for UnconfiguredModel {
    async fn complete(&self, _request: ChatRequest) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

/// Parse a structured reply, tolerating Markdown code fences and prose
/// around the JSON object
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let body = strip_code_fence(text.trim());

    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let start = body.find('{');
            let end = body.rfind('}');
            match (start, end) {
                (Some(start), Some(end)) if end > start => serde_json::from_str(&body[start..=end])
                    .map_err(|e| LlmError::Parse(e.to_string())),
                _ => Err(LlmError::Parse(first_err.to_string())),
            }
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
