//! OpenAI chat-completions client

use super::types::{ApiErrorBody, CompletionRequest, CompletionResponse, ResponseFormat};
use super::{ChatModel, ChatRequest, LlmError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("xpi-an/", env!("CARGO_PKG_VERSION"));

/// Chat model backed by the OpenAI chat-completions endpoint
pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChatModel {
    /// Create a client; `timeout` bounds every request end to end
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: self.model.clone(),
            messages: request.messages,
            temperature: Some(0.0),
            response_format: Some(ResponseFormat::json_schema(
                request.schema.name,
                request.schema.schema,
            )),
        };

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, schema = request.schema.name, "Calling chat model");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Parse(format!("Failed to parse response: {}", e))
            }
        })?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        if let Some(refusal) = choice.message.refusal {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: format!("Model refused: {}", refusal),
            });
        }

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(LlmError::EmptyResponse),
        }
    }
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let model = OpenAiChatModel::new("k", "https://api.example.com/v1/", "gpt-4o", Duration::from_secs(5))
            .unwrap();
        assert_eq!(model.base_url, "https://api.example.com/v1");
        assert_eq!(model.model(), "gpt-4o");
    }

    #[test]
    fn test_debug_redacts_key() {
        let model = OpenAiChatModel::new("sk-secret", "https://api.example.com/v1", "gpt-4o", Duration::from_secs(5))
            .unwrap();
        let rendered = format!("{:?}", model);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        // Port 9 (discard) on localhost is not expected to speak HTTP
        let model = OpenAiChatModel::new("k", "http://127.0.0.1:9", "gpt-4o", Duration::from_secs(2)).unwrap();
        let request = ChatRequest {
            messages: vec![xpi_common::Message::new("system", "hi")],
            schema: crate::llm::OutputSchema {
                name: "test",
                schema: serde_json::json!({"type": "object"}),
            },
        };
        let result = model.complete(request).await;
        assert!(matches!(result, Err(LlmError::Network(_)) | Err(LlmError::Timeout)));
    }
}
