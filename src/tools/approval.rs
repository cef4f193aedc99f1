//! Terminal tools offered to the approval classifier
//!
//! These never touch the outside world. Invoking one ends the approval
//! sub-conversation and its return string becomes the outcome text.

use crate::llm::ToolDefinition;
use crate::turn::ToolCall;
use serde_json::{json, Value};

pub const APPROVAL_GRANTED: &str = "ApprovalGranted";
pub const APPROVAL_DENIED: &str = "ApprovalDenied";
pub const APPROVAL_OTHER: &str = "ApprovalOther";

const OTHER_ARG: &str = "human_operator_response";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalTool {
    Granted,
    Denied,
    Other,
}

impl TerminalTool {
    pub const ALL: [TerminalTool; 3] = [TerminalTool::Granted, TerminalTool::Denied, TerminalTool::Other];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            APPROVAL_GRANTED => Some(TerminalTool::Granted),
            APPROVAL_DENIED => Some(TerminalTool::Denied),
            APPROVAL_OTHER => Some(TerminalTool::Other),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TerminalTool::Granted => APPROVAL_GRANTED,
            TerminalTool::Denied => APPROVAL_DENIED,
            TerminalTool::Other => APPROVAL_OTHER,
        }
    }

    fn description(self) -> &'static str {
        match self {
            TerminalTool::Granted => "Invoke to indicate that the human operator has approved the operation.",
            TerminalTool::Denied => "Invoke to indicate that the human operator has denied approval for the operation.",
            TerminalTool::Other => {
                "Invoke to indicate that the human operator's response is unclear, off-topic, or needs more information."
            }
        }
    }

    fn input_schema(self) -> Value {
        match self {
            TerminalTool::Granted | TerminalTool::Denied => json!({
                "type": "object",
                "properties": {}
            }),
            TerminalTool::Other => json!({
                "type": "object",
                "required": [OTHER_ARG],
                "properties": {
                    OTHER_ARG: {
                        "type": "string",
                        "description": "The full response from the human operator."
                    }
                }
            }),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Definitions for all three terminal tools
    pub fn definitions() -> Vec<ToolDefinition> {
        Self::ALL.iter().map(|t| t.definition()).collect()
    }

    /// Produce the decision text for a terminal call.
    ///
    /// `ApprovalOther` quotes its argument; when the model omitted it the
    /// latest human reply is used instead.
    pub fn decide(self, call: &ToolCall, latest_human: Option<&str>) -> String {
        match self {
            TerminalTool::Granted => "The human operator approved the operation.".to_string(),
            TerminalTool::Denied => "The human operator denied the operation.".to_string(),
            TerminalTool::Other => {
                let response = call.str_arg(OTHER_ARG).or(latest_human).unwrap_or_default();
                format!(
                    "The human operator changed the topic or needs more information.  \
                     Here's what they said:\n\n<human_response>{response}</human_response>"
                )
            }
        }
    }
}
