//! Mock implementations for testing
//!
//! These mocks enable end-to-end step testing without real I/O.

use super::traits::*;
use super::{ConversationRuntime, LlmApprovalFlow, StepError};
use crate::llm::{LlmError, ToolDefinition};
use crate::state_machine::{ConversationState, DENIED_RESULT, SKIPPED_RESULT};
use crate::tools::{Tool, ToolError, ToolRegistry};
use crate::turn::{AssistantTurn, ToolCall, Turn};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock LLM Client
// ============================================================================

/// A recorded `generate` call
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub turns: Vec<Turn>,
    pub tools: Vec<String>,
}

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<AssistantTurn, LlmError>>>,
    model_id: String,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: AssistantTurn) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a text-only response
    pub fn queue_text(&self, text: &str) {
        self.queue_response(AssistantTurn::text(text));
    }

    /// Queue a response carrying one tool call
    pub fn queue_tool_call(&self, id: &str, name: &str, args: Value) {
        let args = args.as_object().cloned().unwrap_or_default();
        self.queue_response(AssistantTurn::default().with_tool_call(ToolCall::new(id, name, args)));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, turns: &[Turn], tools: &[ToolDefinition]) -> Result<AssistantTurn, LlmError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            turns: turns.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Tool
// ============================================================================

/// Tool with a fixed output that records every invocation
pub struct MockTool {
    name: &'static str,
    output: Result<String, ToolError>,
    calls: Mutex<Vec<Map<String, Value>>>,
}

impl MockTool {
    pub fn new(name: &'static str, output: &str) -> Self {
        Self {
            name,
            output: Ok(output.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &'static str, error: ToolError) -> Self {
        Self {
            name,
            output: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Map<String, Value>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> String {
        format!("Mock {}", self.name)
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn run(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        self.calls.lock().unwrap().push(args);
        self.output.clone()
    }
}

// ============================================================================
// In-Memory Session Store
// ============================================================================

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, ConversationState>>,
    saves: Mutex<usize>,
    fail_saves: Mutex<bool>,
}

impl InMemorySessionStore {
    pub fn get(&self, thread_id: &str) -> Option<ConversationState> {
        self.sessions.lock().unwrap().get(thread_id).cloned()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, String> {
        Ok(self.get(thread_id))
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), String> {
        if *self.fail_saves.lock().unwrap() {
            return Err("disk full".to_string());
        }
        *self.saves.lock().unwrap() += 1;
        self.sessions
            .lock()
            .unwrap()
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

type TestRuntime =
    ConversationRuntime<Arc<InMemorySessionStore>, Arc<MockLlmClient>, LlmApprovalFlow<Arc<MockLlmClient>>>;

pub struct Harness {
    pub runtime: TestRuntime,
    pub store: Arc<InMemorySessionStore>,
    pub main_llm: Arc<MockLlmClient>,
    pub approval_llm: Arc<MockLlmClient>,
    pub describe: Arc<MockTool>,
    pub list_metrics: Arc<MockTool>,
    pub create_dashboard: Arc<MockTool>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tools(
            MockTool::new("DescribeDomainArn", r#"{"domain_name":"logs"}"#),
            MockTool::new("ListMetricsForOpenSearchDomain", "CPUUtilization, FreeStorageSpace, Nodes"),
            MockTool::new("CreateDashboard", "Created dashboard 'logs-health'"),
        )
    }

    pub fn with_tools(describe: MockTool, list_metrics: MockTool, create_dashboard: MockTool) -> Self {
        let store = Arc::new(InMemorySessionStore::default());
        let main_llm = Arc::new(MockLlmClient::new("main-mock"));
        let approval_llm = Arc::new(MockLlmClient::new("approval-mock"));
        let describe = Arc::new(describe);
        let list_metrics = Arc::new(list_metrics);
        let create_dashboard = Arc::new(create_dashboard);

        let registry = ToolRegistry::builder()
            .normal(describe.clone())
            .direct(list_metrics.clone())
            .needs_approval(create_dashboard.clone())
            .build()
            .unwrap();

        let runtime = ConversationRuntime::new(
            store.clone(),
            main_llm.clone(),
            LlmApprovalFlow::new(approval_llm.clone()),
            Arc::new(registry),
            "test system prompt",
        );

        Self {
            runtime,
            store,
            main_llm,
            approval_llm,
            describe,
            list_metrics,
            create_dashboard,
        }
    }

    /// Drive a thread into the awaiting-approval state (Scenario A)
    pub async fn request_dashboard(&self, thread_id: &str) -> String {
        self.main_llm.queue_tool_call(
            "toolu_dash",
            "CreateDashboard",
            json!({"dashboard_name": "logs-health", "metrics": ["CPUUtilization"]}),
        );
        self.runtime
            .step(thread_id, "Create a dashboard with CPUUtilization")
            .await
            .unwrap()
            .text
    }
}

fn tool_results(turns: &[Turn]) -> Vec<(String, bool)> {
    turns
        .iter()
        .filter_map(|t| match t {
            Turn::ToolResult { content, is_error, .. } => Some((content.clone(), *is_error)),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_approval_requested() {
    let h = Harness::new();
    let text = h.request_dashboard("t1").await;

    assert!(text.starts_with("Before I can perform that action, I need your approval."));
    assert!(text.contains("CreateDashboard"));
    let state = h.store.get("t1").unwrap();
    assert!(state.approval_in_progress());
    assert!(state.handoff_pending());
    assert_eq!(state.pending_approval_ops().unwrap()[0].name, "CreateDashboard");
    assert!(h.create_dashboard.calls().is_empty());
    assert_eq!(h.approval_llm.request_count(), 0);
    assert_eq!(state.turns()[0], Turn::system("test system prompt"));
}

#[tokio::test]
async fn test_approval_granted_runs_pending_call() {
    let h = Harness::new();
    h.request_dashboard("t1").await;

    h.approval_llm.queue_tool_call("a1", "ApprovalGranted", json!({}));
    h.main_llm.queue_text("Your dashboard is ready.");
    let out = h.runtime.step("t1", "Approved").await.unwrap();

    assert_eq!(out.text, "Your dashboard is ready.");
    let calls = h.create_dashboard.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["dashboard_name"], "logs-health");

    assert!(!out.state.approval_in_progress());
    assert!(out.state.pending_approval_ops().is_none());
    assert!(out.state.approval().is_none());
    assert_eq!(
        tool_results(out.state.turns()),
        vec![("Created dashboard 'logs-health'".to_string(), false)]
    );

    // The approval classifier saw only its own history and terminal tools
    let approval_req = &h.approval_llm.recorded_requests()[0];
    assert!(matches!(&approval_req.turns[0], Turn::System { text } if text.contains("<operation>")));
    assert_eq!(approval_req.turns[1], Turn::user("Approved"));
    assert_eq!(approval_req.tools, vec!["ApprovalGranted", "ApprovalDenied", "ApprovalOther"]);
    assert!(!approval_req.turns.contains(&Turn::user("Create a dashboard with CPUUtilization")));
}

#[tokio::test]
async fn test_approval_denied_injects_refusal() {
    let h = Harness::new();
    h.request_dashboard("t1").await;

    h.approval_llm.queue_tool_call("a1", "ApprovalDenied", json!({}));
    h.main_llm.queue_text("Understood, I won't create it.");
    let out = h.runtime.step("t1", "No, don't").await.unwrap();

    assert_eq!(out.text, "Understood, I won't create it.");
    assert!(h.create_dashboard.calls().is_empty());
    assert_eq!(tool_results(out.state.turns()), vec![(DENIED_RESULT.to_string(), false)]);
    assert!(out.state.pending_approval_ops().is_none());

    // The synthetic result answers the pending call id
    let last_request = h.main_llm.recorded_requests().pop().unwrap();
    assert!(last_request.turns.iter().any(|t| matches!(
        t,
        Turn::ToolResult { tool_call_id, .. } if tool_call_id == "toolu_dash"
    )));
}

#[tokio::test]
async fn test_approval_other_keeps_pending() {
    let h = Harness::new();
    h.request_dashboard("t1").await;

    h.approval_llm.queue_tool_call(
        "a1",
        "ApprovalOther",
        json!({"human_operator_response": "How much will it cost?"}),
    );
    h.main_llm.queue_text("Dashboards cost $3/month.");
    let out = h.runtime.step("t1", "How much will it cost?").await.unwrap();

    assert_eq!(out.text, "Dashboards cost $3/month.");
    assert!(out.state.pending_approval_ops().is_some());
    assert!(!out.state.approval_in_progress());
    let results = tool_results(out.state.turns());
    assert_eq!(results.len(), 1);
    assert!(results[0].0.contains("<human_response>How much will it cost?</human_response>"));

    // Next turn goes to the main LLM, not the classifier
    h.main_llm.queue_text("Anything else?");
    h.runtime.step("t1", "ok thanks").await.unwrap();
    assert_eq!(h.approval_llm.request_count(), 1);
}

#[tokio::test]
async fn test_approval_clarification_stays_active() {
    let h = Harness::new();
    h.request_dashboard("t1").await;

    h.approval_llm.queue_text("Please answer yes or no.");
    let out = h.runtime.step("t1", "hmm").await.unwrap();
    assert_eq!(out.text, "Please answer yes or no.");
    assert!(out.state.approval_in_progress());
    assert!(!out.state.handoff_pending());
    assert_eq!(h.main_llm.request_count(), 1);

    h.approval_llm.queue_tool_call("a2", "ApprovalGranted", json!({}));
    h.main_llm.queue_text("Done.");
    let out = h.runtime.step("t1", "yes").await.unwrap();
    assert_eq!(out.text, "Done.");
    assert_eq!(h.create_dashboard.calls().len(), 1);

    let second = &h.approval_llm.recorded_requests()[1];
    assert_eq!(second.turns.len(), 4);
}

#[tokio::test]
async fn test_parallel_requests_all_answered_after_denial() {
    let h = Harness::new();
    let args = json!({"dashboard_name": "logs-health", "metrics": ["Nodes"]});
    let args = args.as_object().cloned().unwrap();
    h.main_llm.queue_response(AssistantTurn {
        text: None,
        tool_calls: vec![
            ToolCall::new("toolu_a", "CreateDashboard", args.clone()),
            ToolCall::new("toolu_b", "CreateDashboard", args),
        ],
    });
    h.runtime.step("t1", "Create two dashboards").await.unwrap();

    h.approval_llm.queue_tool_call("a1", "ApprovalDenied", json!({}));
    h.main_llm.queue_text("Okay, nothing was created.");
    let out = h.runtime.step("t1", "no").await.unwrap();
    assert_eq!(out.text, "Okay, nothing was created.");

    // Every tool call the main LLM sees has a result
    let last_request = h.main_llm.recorded_requests().pop().unwrap();
    let answered: Vec<&str> = last_request
        .turns
        .iter()
        .filter_map(|t| match t {
            Turn::ToolResult { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(answered, vec!["toolu_a", "toolu_b"]);
    assert_eq!(
        tool_results(out.state.turns()),
        vec![
            (SKIPPED_RESULT.to_string(), false),
            (DENIED_RESULT.to_string(), false)
        ]
    );
    assert!(h.create_dashboard.calls().is_empty());
}

#[tokio::test]
async fn test_approved_tool_failure_is_absorbed() {
    let h = Harness::with_tools(
        MockTool::new("DescribeDomainArn", ""),
        MockTool::new("ListMetricsForOpenSearchDomain", ""),
        MockTool::failing("CreateDashboard", ToolError::Execution("permission denied".into())),
    );
    h.request_dashboard("t1").await;

    h.approval_llm.queue_tool_call("a1", "ApprovalGranted", json!({}));
    h.main_llm.queue_text("The dashboard could not be created.");
    let out = h.runtime.step("t1", "yes").await.unwrap();

    assert_eq!(out.text, "The dashboard could not be created.");
    assert_eq!(h.create_dashboard.calls().len(), 1);
    assert_eq!(
        tool_results(out.state.turns()),
        vec![("Error: permission denied".to_string(), true)]
    );
    assert!(out.state.pending_approval_ops().is_none());
    assert!(!out.state.routes_to_approval());
}

#[tokio::test]
async fn test_direct_tool_failure_ends_step() {
    let h = Harness::with_tools(
        MockTool::new("DescribeDomainArn", ""),
        MockTool::failing(
            "ListMetricsForOpenSearchDomain",
            ToolError::InvalidInput("not a domain ARN".into()),
        ),
        MockTool::new("CreateDashboard", ""),
    );
    h.main_llm.queue_tool_call("toolu_list", "ListMetricsForOpenSearchDomain", json!({"domain_arn": "x"}));
    let out = h.runtime.step("t1", "List metrics for x").await.unwrap();

    assert_eq!(out.text, "Error: Invalid input: not a domain ARN");
    assert_eq!(h.main_llm.request_count(), 1);
    let turns = out.state.turns();
    assert!(matches!(
        &turns[turns.len() - 2],
        Turn::ToolResult { is_error: true, content, .. } if content == "Error: Invalid input: not a domain ARN"
    ));
    assert_eq!(turns[turns.len() - 1], Turn::assistant_text("Error: Invalid input: not a domain ARN"));
}

#[tokio::test]
async fn test_direct_tool_skips_llm() {
    let h = Harness::new();
    h.main_llm.queue_tool_call(
        "toolu_list",
        "ListMetricsForOpenSearchDomain",
        json!({"domain_arn": "arn:aws:es:us-west-2:123456789012:domain/logs"}),
    );
    let out = h.runtime.step("t1", "List raw metric names for logs").await.unwrap();

    assert_eq!(out.text, "CPUUtilization, FreeStorageSpace, Nodes");
    assert_eq!(h.main_llm.request_count(), 1);
    let turns = out.state.turns();
    assert!(matches!(&turns[turns.len() - 2], Turn::ToolResult { tool_call_id, .. } if tool_call_id == "toolu_list"));
    assert_eq!(turns[turns.len() - 1], Turn::assistant_text("CPUUtilization, FreeStorageSpace, Nodes"));
}

#[tokio::test]
async fn test_normal_tool_returns_to_llm() {
    let h = Harness::new();
    h.main_llm.queue_tool_call("toolu_d", "DescribeDomainArn", json!({"domain_arn": "x"}));
    h.main_llm.queue_text("The domain is called logs.");
    let out = h.runtime.step("t1", "What is this ARN?").await.unwrap();

    assert_eq!(out.text, "The domain is called logs.");
    assert_eq!(h.describe.calls().len(), 1);
    assert_eq!(h.main_llm.request_count(), 2);
    let second = &h.main_llm.recorded_requests()[1];
    assert!(matches!(second.turns.last(), Some(Turn::ToolResult { .. })));
}

#[tokio::test]
async fn test_tool_failure_is_absorbed() {
    let h = Harness::with_tools(
        MockTool::failing("DescribeDomainArn", ToolError::InvalidInput("bad arn".into())),
        MockTool::new("ListMetricsForOpenSearchDomain", ""),
        MockTool::new("CreateDashboard", ""),
    );
    h.main_llm.queue_tool_call("toolu_d", "DescribeDomainArn", json!({}));
    h.main_llm.queue_text("That ARN looks wrong.");
    let out = h.runtime.step("t1", "describe it").await.unwrap();

    assert_eq!(out.text, "That ARN looks wrong.");
    assert_eq!(
        tool_results(out.state.turns()),
        vec![("Error: Invalid input: bad arn".to_string(), true)]
    );
}

#[tokio::test]
async fn test_unknown_tool_fails_without_saving() {
    let h = Harness::new();
    h.main_llm.queue_text("Hello!");
    h.runtime.step("t1", "hi").await.unwrap();
    let before = h.store.get("t1").unwrap();

    h.main_llm.queue_tool_call("x", "DeleteDomain", json!({}));
    let err = h.runtime.step("t1", "delete it").await.unwrap_err();
    assert!(matches!(err, StepError::UnknownTool(_)));
    assert!(!err.is_retryable());
    assert_eq!(h.store.get("t1").unwrap(), before);
    assert_eq!(h.store.save_count(), 1);
}

#[tokio::test]
async fn test_llm_failure_leaves_state_unmodified() {
    let h = Harness::new();
    h.request_dashboard("t1").await;
    let before = h.store.get("t1").unwrap();

    h.approval_llm.queue_error(LlmError::from_status(429, "slow down"));
    let err = h.runtime.step("t1", "Approved").await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.store.get("t1").unwrap(), before);

    // Retrying the same turn works
    h.approval_llm.queue_tool_call("a1", "ApprovalGranted", json!({}));
    h.main_llm.queue_text("Created.");
    let out = h.runtime.step("t1", "Approved").await.unwrap();
    assert_eq!(out.text, "Created.");
}

#[tokio::test]
async fn test_invalid_outcome_is_fatal() {
    struct BadFlow;

    #[async_trait]
    impl ApprovalFlow for BadFlow {
        async fn step(
            &self,
            _state: &crate::state_machine::ApprovalState,
        ) -> Result<crate::state_machine::ApprovalStep, LlmError> {
            Ok(crate::state_machine::ApprovalStep {
                update: crate::turn::TurnUpdate::Append(vec![]),
                status: crate::state_machine::ApprovalStatus::Completed {
                    tool_name: "ApprovalMaybe".to_string(),
                    text: String::new(),
                },
            })
        }
    }

    let store = Arc::new(InMemorySessionStore::default());
    let llm = Arc::new(MockLlmClient::new("main"));
    let registry = ToolRegistry::builder()
        .needs_approval(Arc::new(MockTool::new("CreateDashboard", "ok")))
        .build()
        .unwrap();
    let runtime = ConversationRuntime::new(store.clone(), llm.clone(), BadFlow, Arc::new(registry), "sys");

    llm.queue_tool_call("c", "CreateDashboard", json!({}));
    runtime.step("t1", "make one").await.unwrap();
    let err = runtime.step("t1", "yes").await.unwrap_err();
    assert!(matches!(err, StepError::InvalidApprovalOutcome(name) if name == "ApprovalMaybe"));
    assert!(store.get("t1").unwrap().handoff_pending());
}

#[tokio::test]
async fn test_store_failure_is_fatal() {
    let h = Harness::new();
    h.store.set_fail_saves(true);
    h.main_llm.queue_text("Hi");
    let err = h.runtime.step("t1", "hello").await.unwrap_err();
    assert!(matches!(err, StepError::Store(_)));
    assert!(h.store.get("t1").is_none());
}

#[tokio::test]
async fn test_threads_are_independent() {
    let h = Harness::new();
    h.request_dashboard("t1").await;

    h.main_llm.queue_text("Hello from t2");
    let out = h.runtime.step("t2", "hi").await.unwrap();
    assert_eq!(out.text, "Hello from t2");
    assert!(!out.state.approval_in_progress());
    assert!(h.store.get("t1").unwrap().approval_in_progress());
}
