//! Pure state transition function
//!
//! Given the same state, store contents and event, `transition` produces the
//! same result, except for the fresh id given to a reply whose id collides.
//! It reads the store but never mutates it; all mutation is expressed as
//! effects for the runtime to execute.

use super::{reset, submission, Effect, Event, SyncState};
use crate::conversation::{ConversationStore, MessageId};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SyncState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SyncState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A submission or reset is already in progress")]
    SubmissionInProgress,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Message {0} is not a resettable assistant message")]
    InvalidResetTarget(MessageId),
    #[error("Invalid transition: {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

/// Pure transition function
pub fn transition(
    state: &SyncState,
    store: &ConversationStore,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User intents
        // ============================================================

        (SyncState::Idle, Event::UserSubmit { message_id, text }) => {
            submission::begin(message_id, &text)
        }

        (SyncState::Idle, Event::UserReset { message_id }) => reset::begin(store, message_id),

        (SyncState::Idle, Event::UserSelect { message_id }) => reset::select(store, message_id),

        // Busy + any intent -> reject, nothing is queued
        (
            SyncState::Submitting { .. } | SyncState::Resetting { .. },
            Event::UserSubmit { .. } | Event::UserReset { .. } | Event::UserSelect { .. },
        ) => Err(TransitionError::SubmissionInProgress),

        // ============================================================
        // Submission outcomes
        // ============================================================

        (SyncState::Submitting { pending }, Event::SubmitSucceeded { reply }) => {
            Ok(submission::reconcile(store, pending, reply))
        }

        (SyncState::Submitting { pending }, Event::SubmitFailed { error }) => {
            Ok(submission::roll_back(pending, error))
        }

        // ============================================================
        // Reset outcomes
        // ============================================================

        (SyncState::Resetting { anchor, .. }, Event::ResetSucceeded) => Ok(reset::confirm(anchor)),

        (
            SyncState::Resetting {
                anchor,
                previous_snapshot,
            },
            Event::ResetFailed { error },
        ) => Ok(reset::roll_back(anchor, previous_snapshot, error)),

        // ============================================================
        // Invalid Transitions
        // ============================================================

        (state, event) => Err(TransitionError::InvalidTransition {
            state: state.name(),
            event: event.name(),
        }),
    }
}
