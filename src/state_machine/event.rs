//! Events that drive the main conversation machine

use super::approval::ApprovalStatus;
use crate::turn::{AssistantTurn, TurnUpdate};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// A turn typed by the human operator
    HumanInput { text: String },

    /// The main LLM answered
    LlmResponse { turn: AssistantTurn },

    /// A tool finished. Failures arrive here too with `is_error` set.
    ToolComplete {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },

    /// The approval flow processed one human turn
    ApprovalReport { update: TurnUpdate, status: ApprovalStatus },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::HumanInput { .. } => "human_input",
            Event::LlmResponse { .. } => "llm_response",
            Event::ToolComplete { .. } => "tool_complete",
            Event::ApprovalReport { .. } => "approval_report",
        }
    }
}
