//! Runtime hosting the synchronization controller of one negotiation
//!
//! The runtime is an actor: it owns the message store and the
//! [`SyncState`](crate::state_machine::SyncState), processes one command at a
//! time, and spawns the service calls as background tasks whose outcome comes
//! back as an event. Presentation layers talk to it through a
//! [`ConversationHandle`].

mod executor;
mod handle;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use handle::ConversationHandle;

use crate::conversation::{Message, MessageId, NegotiationId, StoreError};
use crate::service::ServiceError;
use crate::state_machine::{Event, TransitionError};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

/// Read-only projection the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationView {
    pub negotiation_id: NegotiationId,
    pub messages: Vec<Message>,
    /// Current content of the input field
    pub draft: String,
    /// A submission or reset is in flight
    pub busy: bool,
}

/// Errors returned to the caller of a user intent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("A submission or reset is already in progress")]
    SubmissionInProgress,
    #[error("Cannot send an empty message")]
    EmptyMessage,
    #[error("Message {0} is not a resettable assistant message")]
    InvalidResetTarget(MessageId),
    #[error("Failed to send message: {0}")]
    SubmissionFailed(ServiceError),
    #[error("Failed to reset conversation: {0}")]
    ResetFailed(ServiceError),
    #[error("Internal controller error: {0}")]
    Internal(String),
    #[error("Conversation runtime has stopped")]
    Stopped,
}

impl From<TransitionError> for ControllerError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::SubmissionInProgress => ControllerError::SubmissionInProgress,
            TransitionError::EmptyMessage => ControllerError::EmptyMessage,
            TransitionError::InvalidResetTarget(id) => ControllerError::InvalidResetTarget(id),
            TransitionError::InvalidTransition { .. } => ControllerError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        ControllerError::Internal(err.to_string())
    }
}

/// How a user intent settled
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Submission round trip completed with this assistant reply
    Reconciled(Message),
    /// Server confirmed the reset to this anchor
    ResetConfirmed(MessageId),
    /// Intent accepted but nothing to do (selecting a user message)
    Ignored,
}

type Reply = oneshot::Sender<Result<Outcome, ControllerError>>;

/// Messages accepted by the runtime loop
pub(crate) enum Command {
    /// A user intent; answered once the operation settles
    Intent { event: Event, reply: Reply },
    /// Replace the draft input
    UpdateDraft(String),
}
