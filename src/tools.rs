//! Tools and the handling-class registry
//!
//! Every tool is registered exactly once under one of three handling classes.
//! The registry is built at startup and rejects duplicate names, so the three
//! name sets are disjoint by construction.

pub mod approval;
mod dashboard;
mod metrics;

pub use approval::TerminalTool;
pub use dashboard::CreateDashboardTool;
pub use metrics::{
    parse_domain_arn, DescribeDomainArnTool, DomainDetails, ListMetricsTool, MetricCatalog, StaticMetricCatalog,
};

use crate::llm::ToolDefinition;
use crate::turn::ToolCall;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single tool invocation. Never fatal to a session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Tool not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Execution(String),
}

/// A tool name outside every registered set
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Unknown tool: {0}")]
pub struct UnknownTool(pub String);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("Tool {name} registered as both {first:?} and {second:?}")]
    Duplicate {
        name: String,
        first: ToolClass,
        second: ToolClass,
    },
    #[error("Tool name {0} is reserved for approval classification")]
    Reserved(String),
}

/// Trait for tools that can be executed by the assistant
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool
    async fn run(&self, args: Map<String, Value>) -> Result<String, ToolError>;
}

/// How a tool call is handled once the LLM asks for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolClass {
    /// Invoke, append the result, hand back to the LLM
    Normal,
    /// Invoke and show the raw result to the human without another LLM call
    Direct,
    /// Ask the human first
    NeedsApproval,
}

/// A handler tagged with its handling class
#[derive(Clone)]
pub enum RegisteredTool {
    Normal(Arc<dyn Tool>),
    Direct(Arc<dyn Tool>),
    NeedsApproval(Arc<dyn Tool>),
}

impl RegisteredTool {
    pub fn class(&self) -> ToolClass {
        match self {
            RegisteredTool::Normal(_) => ToolClass::Normal,
            RegisteredTool::Direct(_) => ToolClass::Direct,
            RegisteredTool::NeedsApproval(_) => ToolClass::NeedsApproval,
        }
    }

    pub fn handler(&self) -> &Arc<dyn Tool> {
        match self {
            RegisteredTool::Normal(t) | RegisteredTool::Direct(t) | RegisteredTool::NeedsApproval(t) => t,
        }
    }
}

/// Collection of tools available to the main conversation
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Standard registry for the operations assistant
    pub fn standard(catalog: Arc<dyn MetricCatalog>, dashboard_dir: PathBuf) -> Result<Self, RegistryError> {
        Self::builder()
            .normal(Arc::new(DescribeDomainArnTool))
            .direct(Arc::new(ListMetricsTool::new(catalog)))
            .needs_approval(Arc::new(CreateDashboardTool::new(dashboard_dir)))
            .build()
    }

    /// Classify a tool call by its name
    pub fn classify(&self, call: &ToolCall) -> Result<ToolClass, UnknownTool> {
        self.tools
            .get(&call.name)
            .map(RegisteredTool::class)
            .ok_or_else(|| UnknownTool(call.name.clone()))
    }

    /// Names registered under a class
    pub fn names(&self, class: ToolClass) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|(_, t)| t.class() == class)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| {
                let tool = t.handler();
                ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description(),
                    input_schema: tool.input_schema(),
                }
            })
            .collect()
    }

    /// Execute a tool by name regardless of its class
    pub async fn invoke(&self, name: &str, args: Map<String, Value>) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.handler().run(args).await
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    entries: Vec<RegisteredTool>,
}

impl ToolRegistryBuilder {
    pub fn normal(mut self, tool: Arc<dyn Tool>) -> Self {
        self.entries.push(RegisteredTool::Normal(tool));
        self
    }

    pub fn direct(mut self, tool: Arc<dyn Tool>) -> Self {
        self.entries.push(RegisteredTool::Direct(tool));
        self
    }

    pub fn needs_approval(mut self, tool: Arc<dyn Tool>) -> Self {
        self.entries.push(RegisteredTool::NeedsApproval(tool));
        self
    }

    /// Check that the three name sets are disjoint and freeze the registry
    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut tools: BTreeMap<String, RegisteredTool> = BTreeMap::new();
        for entry in self.entries {
            let name = entry.handler().name().to_string();
            if TerminalTool::from_name(&name).is_some() {
                return Err(RegistryError::Reserved(name));
            }
            if let Some(existing) = tools.get(&name) {
                return Err(RegistryError::Duplicate {
                    name,
                    first: existing.class(),
                    second: entry.class(),
                });
            }
            tools.insert(name, entry);
        }

        tracing::debug!(
            normal = tools.values().filter(|t| t.class() == ToolClass::Normal).count(),
            direct = tools.values().filter(|t| t.class() == ToolClass::Direct).count(),
            needs_approval = tools.values().filter(|t| t.class() == ToolClass::NeedsApproval).count(),
            "Tool registry built"
        );
        Ok(ToolRegistry { tools })
    }
}
