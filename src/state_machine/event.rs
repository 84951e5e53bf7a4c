//! Events that can occur in a negotiation conversation

use crate::conversation::{Message, MessageId};
use crate::service::ServiceError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserSubmit {
        /// Id for the optimistic message, assigned by the caller
        message_id: MessageId,
        text: String,
    },
    UserReset {
        message_id: MessageId,
    },
    /// User clicked a message; a reset when it is an assistant turn
    UserSelect {
        message_id: MessageId,
    },

    // Service events
    SubmitSucceeded {
        reply: Message,
    },
    SubmitFailed {
        error: ServiceError,
    },
    ResetSucceeded,
    ResetFailed {
        error: ServiceError,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserSubmit { .. } => "user_submit",
            Event::UserReset { .. } => "user_reset",
            Event::UserSelect { .. } => "user_select",
            Event::SubmitSucceeded { .. } => "submit_succeeded",
            Event::SubmitFailed { .. } => "submit_failed",
            Event::ResetSucceeded => "reset_succeeded",
            Event::ResetFailed { .. } => "reset_failed",
        }
    }
}
