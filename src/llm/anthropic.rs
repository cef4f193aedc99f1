//! Anthropic Messages API provider

use super::wire::{MessagesRequest, MessagesResponse};
use super::{Completion, Endpoint, LlmError, LlmService, ToolDefinition};
use crate::turn::Turn;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct AnthropicService {
    client: Client,
    url: String,
    /// `None` when a gateway supplies credentials
    api_key: Option<String>,
    model: String,
}

impl AnthropicService {
    pub fn new(endpoint: &Endpoint, model: impl Into<String>) -> Result<Self, LlmError> {
        let (url, api_key) = match endpoint {
            Endpoint::ApiKey(key) => (API_URL.to_string(), Some(key.clone())),
            Endpoint::Gateway(base) => (
                format!("{}/_/gateway/anthropic/v1/messages", base.trim_end_matches('/')),
                None,
            ),
        };

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            api_key,
            model: model.into(),
        })
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        max_tokens: u32,
    ) -> Result<Completion, LlmError> {
        let body = MessagesRequest::new(&self.model, max_tokens, turns, tools);

        let mut request = self
            .client
            .post(&self.url)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| LlmError::from_transport(&e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &text));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::invalid_response(format!("Failed to parse response: {e} - body: {text}")))?;
        parsed.into_completion()
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
