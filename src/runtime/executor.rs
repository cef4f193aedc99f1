//! Conversation step executor

use super::traits::{ApprovalFlow, LlmClient, SessionStore};
use super::{SessionLocks, StepError, StepOutput};
use crate::state_machine::{
    transition, ApprovalStatus, ConversationState, Effect, Event, Outcome, Phase, TransitionError,
};
use crate::tools::ToolRegistry;
use crate::turn::summary::stringify_history;
use std::sync::Arc;
use std::time::Instant;

/// Drives the main conversation machine for any number of threads
pub struct ConversationRuntime<S, L, A>
where
    S: SessionStore,
    L: LlmClient,
    A: ApprovalFlow,
{
    store: S,
    llm: L,
    approval: A,
    tools: Arc<ToolRegistry>,
    locks: SessionLocks,
    system_prompt: String,
}

impl<S, L, A> ConversationRuntime<S, L, A>
where
    S: SessionStore,
    L: LlmClient,
    A: ApprovalFlow,
{
    pub fn new(store: S, llm: L, approval: A, tools: Arc<ToolRegistry>, system_prompt: impl Into<String>) -> Self {
        Self {
            store,
            llm,
            approval,
            tools,
            locks: SessionLocks::default(),
            system_prompt: system_prompt.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process one human turn on a thread.
    ///
    /// Loads (or creates) the thread's state, runs the machine until it waits
    /// for the human, saves, and returns the text to display. On error the
    /// stored state is untouched.
    pub async fn step(&self, thread_id: &str, text: &str) -> Result<StepOutput, StepError> {
        let _guard = self.locks.acquire(thread_id).await;
        let started = Instant::now();

        let state = self
            .store
            .load(thread_id)
            .await
            .map_err(StepError::Store)?
            .unwrap_or_else(|| {
                tracing::info!(thread_id, "Creating new session");
                ConversationState::new(self.system_prompt.clone())
            });

        tracing::info!(
            thread_id,
            approval_in_progress = state.approval_in_progress(),
            handoff_pending = state.handoff_pending(),
            "Step started"
        );

        let state = match self.run(thread_id, state, text).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(thread_id, error = %e, retryable = e.is_retryable(), "Step failed");
                return Err(e);
            }
        };

        self.store.save(thread_id, &state).await.map_err(StepError::Store)?;

        let text = state.visible_text().unwrap_or_default().to_string();
        tracing::info!(
            thread_id,
            duration_ms = %started.elapsed().as_millis(),
            turns = state.turns().len(),
            approval_in_progress = state.approval_in_progress(),
            outcome = ?state.approval_outcome().map(Outcome::label),
            "Step completed"
        );
        Ok(StepOutput { text, state })
    }

    async fn run(&self, thread_id: &str, mut state: ConversationState, text: &str) -> Result<ConversationState, StepError> {
        let mut phase = Phase::Idle;
        let mut events = vec![Event::HumanInput { text: text.to_string() }];

        while let Some(event) = events.pop() {
            let event_name = event.name();
            let result = transition(&state, &phase, &self.tools, event)?;
            tracing::debug!(
                thread_id,
                event = event_name,
                from = phase.name(),
                to = result.new_phase.name(),
                effects = result.effects.len(),
                "Transition"
            );
            state = result.new_state;
            phase = result.new_phase;

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(thread_id, &state, effect).await? {
                    events.push(generated);
                }
            }
        }

        tracing::debug!(thread_id, history = %stringify_history(state.turns()), "Main history");
        Ok(state)
    }

    async fn execute_effect(
        &self,
        thread_id: &str,
        state: &ConversationState,
        effect: Effect,
    ) -> Result<Option<Event>, StepError> {
        match effect {
            Effect::RequestLlm => {
                tracing::info!(thread_id, model = %self.llm.model_id(), turns = state.turns().len(), "Requesting LLM");
                let turn = self.llm.generate(state.turns(), &self.tools.definitions()).await?;
                Ok(Some(Event::LlmResponse { turn }))
            }

            Effect::ExecuteTool { call, dispatch } => {
                tracing::info!(thread_id, tool = %call.name, id = %call.id, ?dispatch, "Executing tool");
                let started = Instant::now();
                let (content, is_error) = match self.tools.invoke(&call.name, call.args.clone()).await {
                    Ok(output) => (output, false),
                    Err(e) => {
                        tracing::warn!(thread_id, tool = %call.name, error = %e, "Tool failed");
                        (format!("Error: {e}"), true)
                    }
                };
                tracing::debug!(
                    thread_id,
                    tool = %call.name,
                    duration_ms = %started.elapsed().as_millis(),
                    "Tool finished"
                );
                Ok(Some(Event::ToolComplete {
                    tool_call_id: call.id,
                    content,
                    is_error,
                }))
            }

            Effect::DelegateApproval => {
                let approval = state.approval().ok_or_else(|| {
                    TransitionError::InvalidTransition("no approval conversation to delegate to".to_string())
                })?;
                tracing::info!(thread_id, approval_turns = approval.turns().len(), "Delegating to approval flow");
                let step = self.approval.step(approval).await?;
                if let ApprovalStatus::Completed { tool_name, .. } = &step.status {
                    tracing::info!(thread_id, outcome = %tool_name, "Approval flow completed");
                }
                Ok(Some(Event::ApprovalReport {
                    update: step.update,
                    status: step.status,
                }))
            }
        }
    }
}
