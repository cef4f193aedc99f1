//! LLM-backed approval classifier

use super::traits::{ApprovalFlow, LlmClient};
use crate::llm::{LlmError, ToolDefinition};
use crate::state_machine::{route_approval_response, ApprovalState, ApprovalStep};
use crate::tools::TerminalTool;
use async_trait::async_trait;

/// Approval flow that asks an LLM to classify the operator's reply.
///
/// The LLM only sees the approval history and the three terminal tools.
pub struct LlmApprovalFlow<L> {
    llm: L,
    tools: Vec<ToolDefinition>,
}

impl<L: LlmClient> LlmApprovalFlow<L> {
    pub fn new(llm: L) -> Self {
        Self {
            llm,
            tools: TerminalTool::definitions(),
        }
    }
}

#[async_trait]
impl<L: LlmClient> ApprovalFlow for LlmApprovalFlow<L> {
    async fn step(&self, state: &ApprovalState) -> Result<ApprovalStep, LlmError> {
        let response = self.llm.generate(state.turns(), &self.tools).await?;
        let step = route_approval_response(state, response);
        tracing::debug!(
            model = %self.llm.model_id(),
            terminal = step.status.is_terminal(),
            approval_turns = state.turns().len(),
            "Approval step classified"
        );
        Ok(step)
    }
}
