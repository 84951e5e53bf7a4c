//! Submission flow: "user sends a message"
//!
//! `Idle -> Submitting -> (Reconciled | RolledBack) -> Idle`
//!
//! The user message is appended optimistically and the draft cleared before
//! the service is called. A reply is appended on success; on failure the
//! optimistic message is removed again and the text handed back for retry.

use super::transition::{TransitionError, TransitionResult};
use super::{Effect, Notification, SyncState};
use crate::conversation::{ConversationStore, Message, MessageId, Role};
use crate::service::ServiceError;

/// Idle + `UserSubmit` -> Submitting
pub(super) fn begin(
    message_id: MessageId,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    let content = text.trim();
    if content.is_empty() {
        return Err(TransitionError::EmptyMessage);
    }

    let message = Message::new(message_id, Role::User, content);
    Ok(TransitionResult::new(SyncState::Submitting {
        pending: message.clone(),
    })
    .with_effect(Effect::append(message.clone()))
    .with_effect(Effect::ClearDraft)
    .with_effect(Effect::SubmitMessage { message }))
}

/// Submitting + `SubmitSucceeded` -> Idle (reconciled)
///
/// A reply from any role other than assistant is treated like a failed
/// submission. A reply whose id collides with a local message is kept under
/// a fresh local id.
pub(super) fn reconcile(
    store: &ConversationStore,
    pending: &Message,
    mut reply: Message,
) -> TransitionResult {
    if reply.role != Role::Assistant {
        return roll_back(
            pending,
            ServiceError::invalid_response(format!(
                "Expected an assistant reply, got a {} message",
                reply.role
            )),
        );
    }
    if store.contains(&reply.id) {
        let fresh = MessageId::generate();
        tracing::warn!(
            reply_id = %reply.id,
            message_id = %fresh,
            "Reply id already in conversation, assigned a fresh one"
        );
        reply.id = fresh;
    }

    TransitionResult::new(SyncState::Idle)
        .with_effect(Effect::append(reply.clone()))
        .with_effect(Effect::notify(Notification::Reconciled { reply }))
}

/// Submitting + `SubmitFailed` -> Idle (rolled back)
pub(super) fn roll_back(pending: &Message, error: ServiceError) -> TransitionResult {
    TransitionResult::new(SyncState::Idle)
        .with_effect(Effect::RemoveLast)
        .with_effect(Effect::notify(Notification::SubmissionFailed {
            message_id: pending.id.clone(),
            text: pending.content.clone(),
            error,
        }))
}
