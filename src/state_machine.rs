//! Main conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions. The
//! runtime feeds events in and executes the returned effects.

pub mod approval;
mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use approval::{route_approval_response, ApprovalStatus, ApprovalStep};
pub use effect::Effect;
pub use event::Event;
pub use state::{ApprovalState, ConversationState, Dispatch, Outcome, Phase};
pub use transition::{transition, TransitionError, TransitionResult, DENIED_RESULT, SKIPPED_RESULT};
