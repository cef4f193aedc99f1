//! LLM provider abstraction
//!
//! One model serves both the main conversation and the approval classifier.
//! Services take a turn history and hand back the next assistant turn.

mod anthropic;
mod error;
mod wire;

pub use anthropic::{AnthropicService, DEFAULT_MODEL};
pub use error::{LlmError, LlmErrorKind};

use crate::turn::{AssistantTurn, Turn};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// A tool the model may call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Token accounting for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The model's answer to one history
#[derive(Debug, Clone)]
pub struct Completion {
    pub turn: AssistantTurn,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

/// How requests reach the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Direct to the provider with an API key
    ApiKey(String),
    /// Through a gateway that injects credentials itself
    Gateway(String),
}

/// LLM settings read from the environment
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub gateway: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            gateway: var("LLM_GATEWAY"),
            model: var("OPSGATE_MODEL"),
            max_tokens: var("OPSGATE_MAX_TOKENS").and_then(|v| v.parse().ok()),
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    /// A gateway wins over an API key; neither means no LLM
    pub fn endpoint(&self) -> Option<Endpoint> {
        if let Some(gateway) = &self.gateway {
            return Some(Endpoint::Gateway(gateway.clone()));
        }
        self.anthropic_api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .map(|key| Endpoint::ApiKey(key.clone()))
    }

    /// Build the configured service wrapped in request logging
    pub fn build_service(&self) -> Result<Option<Arc<dyn LlmService>>, LlmError> {
        let Some(endpoint) = self.endpoint() else {
            return Ok(None);
        };
        let service = AnthropicService::new(&endpoint, self.model())?;
        Ok(Some(Arc::new(LoggingService::new(Arc::new(service)))))
    }
}

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Produce the assistant turn that follows `turns`
    async fn complete(&self, turns: &[Turn], tools: &[ToolDefinition], max_tokens: u32)
        -> Result<Completion, LlmError>;

    fn model_id(&self) -> &str;
}

/// Records latency, token usage and the shape of every completion
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        max_tokens: u32,
    ) -> Result<Completion, LlmError> {
        let started = Instant::now();
        let result = self.inner.complete(turns, tools, max_tokens).await;
        let duration_ms = started.elapsed().as_millis();

        match &result {
            Ok(completion) => tracing::info!(
                model = %self.inner.model_id(),
                duration_ms = %duration_ms,
                turns = turns.len(),
                tools = tools.len(),
                tool_calls = completion.turn.tool_calls.len(),
                stop_reason = completion.stop_reason.as_deref().unwrap_or("none"),
                input_tokens = completion.usage.input_tokens,
                output_tokens = completion.usage.output_tokens,
                "LLM completion"
            ),
            Err(e) => tracing::error!(
                model = %self.inner.model_id(),
                duration_ms = %duration_ms,
                kind = ?e.kind,
                error = %e.message,
                "LLM completion failed"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
