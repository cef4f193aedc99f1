//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::Database;
use crate::llm::{LlmError, LlmService, ToolDefinition};
use crate::state_machine::{ApprovalState, ApprovalStep, ConversationState};
use crate::turn::{AssistantTurn, Turn};
use async_trait::async_trait;
use std::sync::Arc;

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produce the next assistant turn for a history
    async fn generate(&self, turns: &[Turn], tools: &[ToolDefinition]) -> Result<AssistantTurn, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Storage for per-thread conversation state
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, String>;

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), String>;
}

/// One step of the approval sub-conversation.
///
/// Receives the approval history with the latest human turn already appended
/// and reports the turns to append plus whether a terminal outcome was reached.
#[async_trait]
pub trait ApprovalFlow: Send + Sync {
    async fn step(&self, state: &ApprovalState) -> Result<ApprovalStep, LlmError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn generate(&self, turns: &[Turn], tools: &[ToolDefinition]) -> Result<AssistantTurn, LlmError> {
        (**self).generate(turns, tools).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, String> {
        (**self).load(thread_id).await
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), String> {
        (**self).save(thread_id, state).await
    }
}

#[async_trait]
impl<T: ApprovalFlow + ?Sized> ApprovalFlow for Arc<T> {
    async fn step(&self, state: &ApprovalState) -> Result<ApprovalStep, LlmError> {
        (**self).step(state).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a SessionStore
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl SessionStore for DatabaseStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, String> {
        self.db.load_session(thread_id).map_err(|e| e.to_string())
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), String> {
        self.db.save_session(thread_id, state).map_err(|e| e.to_string())
    }
}

/// Adapter to use an LlmService as an LlmClient
#[derive(Clone)]
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
    max_tokens: u32,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>, max_tokens: u32) -> Self {
        Self { service, max_tokens }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn generate(&self, turns: &[Turn], tools: &[ToolDefinition]) -> Result<AssistantTurn, LlmError> {
        let completion = self.service.complete(turns, tools, self.max_tokens).await?;
        Ok(completion.turn)
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}
