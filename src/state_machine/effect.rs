//! Effects produced by state transitions

use super::state::Dispatch;
use crate::turn::ToolCall;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the main LLM for the next assistant turn
    RequestLlm,

    /// Run a tool; the runtime answers with `Event::ToolComplete`
    ExecuteTool { call: ToolCall, dispatch: Dispatch },

    /// Hand the latest human turn to the approval flow
    DelegateApproval,
}

impl Effect {
    pub fn execute_tool(call: ToolCall, dispatch: Dispatch) -> Self {
        Effect::ExecuteTool { call, dispatch }
    }
}
