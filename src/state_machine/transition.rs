//! Pure state transition function
//!
//! Given the persisted conversation state, the current phase and an event,
//! produce the next state, the next phase and the effects the runtime must
//! execute. No I/O happens here.

use super::approval::ApprovalStatus;
use super::state::{ApprovalState, ConversationState, Dispatch, Outcome, Phase};
use super::{Effect, Event};
use crate::system_prompt::{approval_prompt, approval_request, describe_operations};
use crate::tools::{ToolClass, ToolRegistry, UnknownTool};
use crate::turn::{AssistantTurn, ToolCall, Turn, TurnUpdate};
use thiserror::Error;

/// Tool result injected when the operator refuses an operation
pub const DENIED_RESULT: &str = "The human operator denied permission to perform the operation.";

/// Tool result for calls that share a turn with the routed call
pub const SKIPPED_RESULT: &str = "Not executed: only the last tool call of a response is carried out.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub new_phase: Phase,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState, phase: Phase) -> Self {
        Self {
            new_state: state,
            new_phase: phase,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error(transparent)]
    UnknownTool(#[from] UnknownTool),
    #[error("Approval flow reported unknown outcome: {0}")]
    InvalidApprovalOutcome(String),
    #[error("Approval completed with no pending operation")]
    NoPendingOperation,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &ConversationState,
    phase: &Phase,
    registry: &ToolRegistry,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let state = state.clone();
    match (phase, event) {
        // Human input goes to the approval flow while one is open
        (Phase::Idle, Event::HumanInput { text }) => {
            if state.routes_to_approval() {
                let mut new_state = state.apply_approval(TurnUpdate::one(Turn::user(text)));
                new_state.handoff_pending = false;
                Ok(TransitionResult::new(new_state, Phase::ApprovalActive).with_effect(Effect::DelegateApproval))
            } else {
                let new_state = state.apply_main(TurnUpdate::one(Turn::user(text)));
                Ok(TransitionResult::new(new_state, Phase::LlmRequesting).with_effect(Effect::RequestLlm))
            }
        }

        (Phase::LlmRequesting, Event::LlmResponse { turn }) => {
            let routed = turn.routed_call().cloned();
            let class = routed.as_ref().map(|call| registry.classify(call)).transpose()?;

            // No tool call: the step ends, approval fields untouched
            let Some((call, class)) = routed.zip(class) else {
                let new_state = state.apply_main(TurnUpdate::one(Turn::Assistant(turn)));
                return Ok(TransitionResult::new(new_state, Phase::Idle));
            };

            let dispatch = match class {
                ToolClass::Normal => Dispatch::Normal,
                ToolClass::Direct => Dispatch::Direct,
                ToolClass::NeedsApproval => {
                    let new_state = state.apply_main(TurnUpdate::one(Turn::Assistant(turn.clone())));
                    return Ok(TransitionResult::new(prep_approval(new_state, &turn), Phase::Idle));
                }
            };

            let mut appended = vec![Turn::Assistant(turn.clone())];
            appended.extend(skipped_results(&turn.tool_calls, &call));
            Ok(TransitionResult::new(
                state.apply_main(TurnUpdate::Append(appended)),
                Phase::ToolExecuting {
                    call: call.clone(),
                    dispatch,
                },
            )
            .with_effect(Effect::execute_tool(call, dispatch)))
        }

        (
            Phase::ToolExecuting { call, dispatch },
            Event::ToolComplete {
                tool_call_id,
                content,
                is_error,
            },
        ) => {
            if tool_call_id != call.id {
                return Err(TransitionError::InvalidTransition(format!(
                    "tool result for {tool_call_id} while executing {}",
                    call.id
                )));
            }
            let result = result_turn(call, content.clone(), is_error);
            match dispatch {
                Dispatch::Normal => Ok(TransitionResult::new(
                    state.apply_main(TurnUpdate::one(result)),
                    Phase::LlmRequesting,
                )
                .with_effect(Effect::RequestLlm)),
                Dispatch::Direct => Ok(TransitionResult::new(
                    state.apply_main(TurnUpdate::Append(vec![result, Turn::assistant_text(content)])),
                    Phase::Idle,
                )),
                Dispatch::Approved => {
                    let mut new_state = state.apply_main(TurnUpdate::one(result));
                    new_state.pending_approval_ops = None;
                    Ok(TransitionResult::new(new_state, Phase::LlmRequesting).with_effect(Effect::RequestLlm))
                }
            }
        }

        (Phase::ApprovalActive, Event::ApprovalReport { update, status }) => {
            let mut new_state = state.apply_approval(update);
            // The sub-machine has been entered, so the handoff is over either way
            new_state.handoff_pending = false;
            match status {
                ApprovalStatus::Active => Ok(TransitionResult::new(new_state, Phase::Idle)),
                ApprovalStatus::Completed { tool_name, text } => {
                    let outcome =
                        Outcome::from_report(&tool_name, text).map_err(TransitionError::InvalidApprovalOutcome)?;
                    let ops = new_state.pending_approval_ops.clone().unwrap_or_default();
                    let op = ops.last().cloned().ok_or(TransitionError::NoPendingOperation)?;
                    let skipped = skipped_results(&ops, &op);

                    new_state.approval_in_progress = false;
                    new_state.approval_outcome = Some(outcome.clone());
                    new_state.approval = None;
                    Ok(resume_after_approval(new_state, op, skipped, outcome))
                }
            }
        }

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "{} cannot handle {}",
            phase.name(),
            event.name()
        ))),
    }
}

/// Suspend the main flow and open a fresh approval conversation
fn prep_approval(state: ConversationState, turn: &AssistantTurn) -> ConversationState {
    let ops = turn.tool_calls.clone();
    let operation = describe_operations(&ops);

    let mut new_state = state.apply_main(TurnUpdate::one(Turn::assistant_text(approval_request(&operation))));
    new_state.pending_approval_ops = Some(ops);
    new_state.approval_in_progress = true;
    new_state.handoff_pending = true;
    new_state.approval_outcome = None;
    new_state.approval = Some(ApprovalState::seeded(approval_prompt(&operation)));
    new_state
}

/// Answer the pending call `op` and hand control back to the main flow.
///
/// `answered` holds the skipped results for the other pending calls.
fn resume_after_approval(
    state: ConversationState,
    op: ToolCall,
    mut answered: Vec<Turn>,
    outcome: Outcome,
) -> TransitionResult {
    match outcome {
        Outcome::Granted => TransitionResult::new(
            state.apply_main(TurnUpdate::Append(answered)),
            Phase::ToolExecuting {
                call: op.clone(),
                dispatch: Dispatch::Approved,
            },
        )
        .with_effect(Effect::execute_tool(op, Dispatch::Approved)),
        Outcome::Denied => {
            answered.push(Turn::tool_result(&op, DENIED_RESULT));
            let mut state = state.apply_main(TurnUpdate::Append(answered));
            state.pending_approval_ops = None;
            TransitionResult::new(state, Phase::LlmRequesting).with_effect(Effect::RequestLlm)
        }
        // The operation stays pending so the assistant can follow up on it
        Outcome::Other(text) => {
            answered.push(Turn::tool_result(&op, text));
            TransitionResult::new(state.apply_main(TurnUpdate::Append(answered)), Phase::LlmRequesting)
                .with_effect(Effect::RequestLlm)
        }
    }
}

/// Results for the calls of a turn that are not carried out, so the provider
/// sees an answer for every call it made
fn skipped_results(calls: &[ToolCall], routed: &ToolCall) -> Vec<Turn> {
    calls
        .iter()
        .filter(|c| c.id != routed.id)
        .map(|c| Turn::tool_result(c, SKIPPED_RESULT))
        .collect()
}

fn result_turn(call: &ToolCall, content: String, is_error: bool) -> Turn {
    if is_error {
        Turn::tool_error(call, content)
    } else {
        Turn::tool_result(call, content)
    }
}
