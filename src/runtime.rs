//! Runtime for executing conversation steps
//!
//! A step takes one human turn, runs the main machine until it waits on the
//! human again, and persists the result. Fatal errors abort the step before
//! anything is saved.

mod approval;
mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use approval::LlmApprovalFlow;
pub use executor::ConversationRuntime;
pub use traits::*;

use crate::llm::LlmError;
use crate::state_machine::{ConversationState, TransitionError};
use crate::tools::UnknownTool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = ConversationRuntime<DatabaseStore, ServiceLlmClient, LlmApprovalFlow<ServiceLlmClient>>;

/// Errors that abort a step. The stored state is left as it was.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    UnknownTool(UnknownTool),
    #[error("Approval flow reported unknown outcome: {0}")]
    InvalidApprovalOutcome(String),
    #[error("Session store error: {0}")]
    Store(String),
    #[error(transparent)]
    Transition(TransitionError),
}

impl From<TransitionError> for StepError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::UnknownTool(tool) => StepError::UnknownTool(tool),
            TransitionError::InvalidApprovalOutcome(name) => StepError::InvalidApprovalOutcome(name),
            other => StepError::Transition(other),
        }
    }
}

impl StepError {
    /// Whether repeating the same human turn may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StepError::Llm(e) => e.is_unavailable(),
            StepError::Store(_) => true,
            StepError::UnknownTool(_) | StepError::InvalidApprovalOutcome(_) | StepError::Transition(_) => false,
        }
    }
}

/// Result of a completed step
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Text to show the operator
    pub text: String,
    pub state: ConversationState,
}

/// One async mutex per thread id so steps on the same thread serialize.
///
/// Entries nobody holds or waits on are pruned on the next acquire.
#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(thread_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
