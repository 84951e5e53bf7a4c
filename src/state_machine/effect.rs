//! Effects produced by state transitions

use crate::conversation::{Message, MessageId};
use crate::service::ServiceError;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append to the conversation store
    AppendMessage { message: Message },

    /// Undo the optimistic append
    RemoveLast,

    /// Drop everything after the anchor
    TruncateAfter { message_id: MessageId },

    /// Put back a snapshot taken before an optimistic truncation
    RestoreSnapshot { messages: Vec<Message> },

    /// Empty the presentation layer's input field
    ClearDraft,

    /// Send the user message to the service (spawns as background task)
    SubmitMessage { message: Message },

    /// Ask the service to discard everything after the anchor (background task)
    ResetOnServer { message_id: MessageId },

    /// Notify the presentation layer
    Notify(Notification),
}

impl Effect {
    pub fn append(message: Message) -> Self {
        Effect::AppendMessage { message }
    }

    pub fn notify(notification: Notification) -> Self {
        Effect::Notify(notification)
    }

    /// Whether executing this effect performs network I/O
    pub fn is_service_call(&self) -> bool {
        matches!(
            self,
            Effect::SubmitMessage { .. } | Effect::ResetOnServer { .. }
        )
    }
}

/// Outcome notifications surfaced to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The assistant reply has been appended
    Reconciled { reply: Message },

    /// The optimistic message was rolled back; `text` can be re-submitted
    SubmissionFailed {
        message_id: MessageId,
        text: String,
        error: ServiceError,
    },

    /// The server confirmed the truncation
    ResetConfirmed { anchor: MessageId },

    /// The truncation was rolled back to the previous snapshot
    ResetFailed {
        anchor: MessageId,
        error: ServiceError,
    },

    /// A store contract was violated; the controller returned to idle
    Internal { message: String },
}
