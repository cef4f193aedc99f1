//! Conversation state types

use crate::tools::approval::{APPROVAL_DENIED, APPROVAL_GRANTED, APPROVAL_OTHER};
use crate::turn::{last_assistant_text, last_user_text, merge, ToolCall, Turn, TurnUpdate};
use serde::{Deserialize, Serialize};

/// Final classification of a human approval reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "text", rename_all = "snake_case")]
pub enum Outcome {
    Granted,
    Denied,
    Other(String),
}

impl Outcome {
    /// Map a terminal tool name reported by the approval flow to an outcome.
    ///
    /// Returns the offending name when it is not one of the three terminals.
    pub fn from_report(tool_name: &str, text: String) -> Result<Self, String> {
        match tool_name {
            APPROVAL_GRANTED => Ok(Outcome::Granted),
            APPROVAL_DENIED => Ok(Outcome::Denied),
            APPROVAL_OTHER => Ok(Outcome::Other(text)),
            other => Err(other.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Granted => "granted",
            Outcome::Denied => "denied",
            Outcome::Other(_) => "other",
        }
    }
}

/// History of one approval sub-conversation, separate from the main turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalState {
    turns: Vec<Turn>,
}

impl ApprovalState {
    /// Start a fresh approval conversation seeded with a system prompt
    pub fn seeded(system_prompt: impl Into<String>) -> Self {
        Self::default().apply(TurnUpdate::Reset(vec![Turn::system(system_prompt)]))
    }

    #[must_use]
    pub fn apply(self, update: TurnUpdate) -> Self {
        Self {
            turns: merge(self.turns, update),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Latest reply from the human operator in this approval conversation
    pub fn latest_human(&self) -> Option<&str> {
        last_user_text(&self.turns)
    }
}

/// Persistent per-thread conversation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub(super) turns: Vec<Turn>,
    /// Tool calls of the assistant turn that triggered the approval, until resolved
    #[serde(default)]
    pub(super) pending_approval_ops: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub(super) approval: Option<ApprovalState>,
    #[serde(default)]
    pub(super) approval_outcome: Option<Outcome>,
    #[serde(default)]
    pub(super) approval_in_progress: bool,
    /// Set when the approval prompt was just shown and the next human turn
    /// belongs to the approval conversation
    #[serde(default)]
    pub(super) handoff_pending: bool,
}

impl ConversationState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self::default().apply_main(TurnUpdate::Reset(vec![Turn::system(system_prompt)]))
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn pending_approval_ops(&self) -> Option<&[ToolCall]> {
        self.pending_approval_ops.as_deref()
    }

    pub fn approval(&self) -> Option<&ApprovalState> {
        self.approval.as_ref()
    }

    pub fn approval_outcome(&self) -> Option<&Outcome> {
        self.approval_outcome.as_ref()
    }

    pub fn approval_in_progress(&self) -> bool {
        self.approval_in_progress
    }

    pub fn handoff_pending(&self) -> bool {
        self.handoff_pending
    }

    /// The next human turn belongs to the approval conversation
    pub fn routes_to_approval(&self) -> bool {
        self.handoff_pending || self.approval_in_progress
    }

    #[must_use]
    pub fn apply_main(mut self, update: TurnUpdate) -> Self {
        self.turns = merge(self.turns, update);
        self
    }

    #[must_use]
    pub(super) fn apply_approval(mut self, update: TurnUpdate) -> Self {
        let approval = self.approval.take().unwrap_or_default();
        self.approval = Some(approval.apply(update));
        self
    }

    /// Text the operator should see after a step.
    ///
    /// While the operator is talking to the approval classifier this is the
    /// classifier's latest reply; otherwise the main assistant's.
    pub fn visible_text(&self) -> Option<&str> {
        if self.approval_in_progress && !self.handoff_pending {
            if let Some(text) = self.approval.as_ref().and_then(|a| last_assistant_text(a.turns())) {
                return Some(text);
            }
        }
        last_assistant_text(&self.turns)
    }
}

/// Main machine phase within one step. Never persisted; every step starts at `Idle`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    /// Waiting for a human turn
    #[default]
    Idle,
    /// Main LLM request in flight
    LlmRequesting,
    /// A tool call is running
    ToolExecuting { call: ToolCall, dispatch: Dispatch },
    /// The approval flow is handling the latest human turn
    ApprovalActive,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::LlmRequesting => "llm_requesting",
            Phase::ToolExecuting { .. } => "tool_executing",
            Phase::ApprovalActive => "approval_active",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }
}

/// Why a tool is being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Normal,
    Direct,
    /// A previously pending operation the operator approved
    Approved,
}
