//! Approval sub-machine routing
//!
//! The approval conversation runs `Start -> AwaitingLlm -> {Terminal | AwaitingLlm}`.
//! After each classifier response this module decides whether the
//! conversation has reached a terminal tool and builds the turns to append.
//! Nothing here touches the main conversation history.

use super::state::ApprovalState;
use crate::tools::TerminalTool;
use crate::turn::{AssistantTurn, Turn, TurnUpdate};

/// Whether the approval conversation is still open after a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalStatus {
    /// The classifier needs another human reply
    Active,
    /// A terminal tool ran
    Completed { tool_name: String, text: String },
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApprovalStatus::Completed { .. })
    }
}

/// Result of one approval step, reported to the main machine
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalStep {
    pub update: TurnUpdate,
    pub status: ApprovalStatus,
}

/// Route a classifier response.
///
/// A response whose last tool call names a terminal tool ends the
/// conversation: the tool's decision is appended as a tool result followed
/// by an assistant turn with the same text. Any other response is appended
/// as-is and the conversation stays open.
pub fn route_approval_response(state: &ApprovalState, response: AssistantTurn) -> ApprovalStep {
    let terminal = response
        .routed_call()
        .and_then(|call| TerminalTool::from_name(&call.name).map(|tool| (tool, call.clone())));

    let Some((tool, call)) = terminal else {
        return ApprovalStep {
            update: TurnUpdate::one(Turn::Assistant(response)),
            status: ApprovalStatus::Active,
        };
    };

    let text = tool.decide(&call, state.latest_human());
    ApprovalStep {
        update: TurnUpdate::Append(vec![
            Turn::Assistant(response),
            Turn::tool_result(&call, text.clone()),
            Turn::assistant_text(text.clone()),
        ]),
        status: ApprovalStatus::Completed {
            tool_name: call.name,
            text,
        },
    }
}
