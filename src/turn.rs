//! Conversation turns and the merge operation that owns every turn sequence
//!
//! Turn histories only ever change through [`merge`]: an update either appends
//! to the existing sequence or replaces it wholesale (a reset).

pub mod summary;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool invocation requested by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Read a string argument by key
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

/// Assistant output: optional text plus zero or more tool calls
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssistantTurn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: vec![],
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    /// The call that drives routing. Only the last call of a turn is routed.
    pub fn routed_call(&self) -> Option<&ToolCall> {
        self.tool_calls.last()
    }
}

/// One atomic unit of conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    User {
        text: String,
    },
    System {
        text: String,
    },
    Assistant(AssistantTurn),
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Turn::System { text: text.into() }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Turn::Assistant(AssistantTurn::text(text))
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Turn::ToolResult {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn tool_error(call: &ToolCall, message: impl Into<String>) -> Self {
        Turn::ToolResult {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: message.into(),
            is_error: true,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantTurn> {
        match self {
            Turn::Assistant(a) => Some(a),
            _ => None,
        }
    }
}

/// An update reported back to the state holder
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    /// Append these turns after the existing history
    Append(Vec<Turn>),
    /// Discard the existing history and use these turns instead
    Reset(Vec<Turn>),
}

impl TurnUpdate {
    pub fn one(turn: Turn) -> Self {
        TurnUpdate::Append(vec![turn])
    }
}

/// Merge an update into an existing turn sequence.
///
/// `Append` never removes or reorders what is already there; `Reset` returns
/// exactly the replacement sequence.
pub fn merge(mut existing: Vec<Turn>, incoming: TurnUpdate) -> Vec<Turn> {
    match incoming {
        TurnUpdate::Reset(replacement) => replacement,
        TurnUpdate::Append(turns) => {
            existing.extend(turns);
            existing
        }
    }
}

/// Latest non-empty assistant text in a history
pub fn last_assistant_text(turns: &[Turn]) -> Option<&str> {
    turns
        .iter()
        .rev()
        .filter_map(Turn::as_assistant)
        .find_map(|a| a.text.as_deref().filter(|t| !t.is_empty()))
}

/// Latest human turn text in a history
pub fn last_user_text(turns: &[Turn]) -> Option<&str> {
    turns.iter().rev().find_map(|t| match t {
        Turn::User { text } => Some(text.as_str()),
        _ => None,
    })
}
