//! Simplified, JSON-friendly view of a turn history for logs and the REPL

use super::Turn;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolUseEntry {
    pub tool_name: String,
    pub input: Map<String, Value>,
}

/// One flattened history entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum HistoryEntry {
    #[serde(rename = "User Entry")]
    User { content: String },
    #[serde(rename = "System Entry")]
    System { content: String },
    #[serde(rename = "Tool Entry")]
    Tool { tool_name: String, content: String },
    #[serde(rename = "AI Entry")]
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_use: Vec<ToolUseEntry>,
    },
}

pub fn simplify_history(turns: &[Turn]) -> Vec<HistoryEntry> {
    turns
        .iter()
        .map(|turn| match turn {
            Turn::User { text } => HistoryEntry::User {
                content: text.clone(),
            },
            Turn::System { text } => HistoryEntry::System {
                content: text.clone(),
            },
            Turn::ToolResult {
                tool_name, content, ..
            } => HistoryEntry::Tool {
                tool_name: tool_name.clone(),
                content: content.clone(),
            },
            Turn::Assistant(a) => HistoryEntry::Assistant {
                content: a.text.clone(),
                tool_use: a
                    .tool_calls
                    .iter()
                    .map(|c| ToolUseEntry {
                        tool_name: c.name.clone(),
                        input: c.args.clone(),
                    })
                    .collect(),
            },
        })
        .collect()
}

/// Pretty-printed JSON of the simplified history
pub fn stringify_history(turns: &[Turn]) -> String {
    serde_json::to_string_pretty(&simplify_history(turns)).unwrap_or_else(|_| "[]".to_string())
}
