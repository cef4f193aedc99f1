//! Anthropic Messages wire format, built straight from turn histories

use super::{Completion, LlmError, ToolDefinition, Usage};
use crate::turn::{AssistantTurn, ToolCall, Turn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(super) struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<SystemBlock>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// Only one call per response is ever acted on, so ask for one
#[derive(Debug, Serialize)]
pub(super) struct ToolChoice {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub disable_parallel_tool_use: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(super) struct SystemBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(super) struct Message {
    pub role: Role,
    pub content: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum Block {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
pub(super) struct WireTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl MessagesRequest {
    /// Lay a history out as Messages API input.
    ///
    /// System turns go to the top-level `system` blocks and tool results
    /// travel in user messages. The API wants alternating roles, so adjacent
    /// turns that map to the same role share one message.
    pub fn new(model: &str, max_tokens: u32, turns: &[Turn], tools: &[ToolDefinition]) -> Self {
        let mut system = Vec::new();
        let mut messages: Vec<Message> = Vec::new();

        for turn in turns {
            let (role, blocks) = match turn {
                Turn::System { text } => {
                    system.push(SystemBlock { kind: "text", text: text.clone() });
                    continue;
                }
                Turn::User { text } => (Role::User, vec![Block::Text { text: text.clone() }]),
                Turn::ToolResult {
                    tool_call_id,
                    content,
                    is_error,
                    ..
                } => (
                    Role::User,
                    vec![Block::ToolResult {
                        tool_use_id: tool_call_id.clone(),
                        content: content.clone(),
                        is_error: *is_error,
                    }],
                ),
                Turn::Assistant(a) => (Role::Assistant, assistant_blocks(a)),
            };

            if blocks.is_empty() {
                continue;
            }
            match messages.last_mut() {
                Some(last) if last.role == role => last.content.extend(blocks),
                _ => messages.push(Message { role, content: blocks }),
            }
        }

        Self {
            model: model.to_string(),
            max_tokens,
            temperature: 0.0,
            system,
            messages,
            tools: tools
                .iter()
                .map(|t| WireTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.input_schema.clone(),
                })
                .collect(),
            tool_choice: (!tools.is_empty()).then_some(ToolChoice {
                kind: "auto",
                disable_parallel_tool_use: true,
            }),
        }
    }
}

fn assistant_blocks(turn: &AssistantTurn) -> Vec<Block> {
    let text = turn
        .text
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| Block::Text { text: t.clone() });
    let calls = turn.tool_calls.iter().map(|call| Block::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: Value::Object(call.args.clone()),
    });
    text.chain(calls).collect()
}

#[derive(Debug, Deserialize)]
pub(super) struct MessagesResponse {
    pub content: Vec<Block>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl MessagesResponse {
    /// Fold the response blocks into one assistant turn
    pub fn into_completion(self) -> Result<Completion, LlmError> {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in self.content {
            match block {
                Block::Text { text: t } => text.push_str(&t),
                Block::ToolUse { id, name, input } => {
                    let Value::Object(args) = input else {
                        return Err(LlmError::invalid_response(format!(
                            "tool call {name} has non-object input"
                        )));
                    };
                    tool_calls.push(ToolCall::new(id, name, args));
                }
                Block::ToolResult { .. } => {
                    return Err(LlmError::invalid_response("tool result block in model output"));
                }
            }
        }

        if text.is_empty() && tool_calls.is_empty() {
            return Err(LlmError::invalid_response("empty response"));
        }

        Ok(Completion {
            turn: AssistantTurn {
                text: (!text.is_empty()).then_some(text),
                tool_calls,
            },
            stop_reason: self.stop_reason,
            usage: self.usage,
        })
    }
}
