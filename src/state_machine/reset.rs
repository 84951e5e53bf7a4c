//! Reset flow: "user rewinds to message M"
//!
//! Resets are anchored on assistant messages. The store is truncated
//! optimistically after a snapshot is taken; a server failure restores the
//! snapshot in full.

use super::transition::{TransitionError, TransitionResult};
use super::{Effect, Notification, SyncState};
use crate::conversation::{ConversationStore, Message, MessageId};
use crate::service::ServiceError;

/// Idle + `UserReset` -> Resetting
pub(super) fn begin(
    store: &ConversationStore,
    anchor: MessageId,
) -> Result<TransitionResult, TransitionError> {
    if !store.get(&anchor).is_some_and(Message::is_assistant) {
        return Err(TransitionError::InvalidResetTarget(anchor));
    }

    let previous_snapshot = store.snapshot();
    Ok(TransitionResult::new(SyncState::Resetting {
        anchor: anchor.clone(),
        previous_snapshot,
    })
    .with_effect(Effect::TruncateAfter {
        message_id: anchor.clone(),
    })
    .with_effect(Effect::ResetOnServer { message_id: anchor }))
}

/// Idle + `UserSelect`: assistant turns start a reset, user turns are ignored
pub(super) fn select(
    store: &ConversationStore,
    message_id: MessageId,
) -> Result<TransitionResult, TransitionError> {
    match store.get(&message_id) {
        Some(message) if message.is_assistant() => begin(store, message_id),
        Some(_) => Ok(TransitionResult::new(SyncState::Idle)),
        None => Err(TransitionError::InvalidResetTarget(message_id)),
    }
}

/// Resetting + `ResetSucceeded` -> Idle, truncation stands
pub(super) fn confirm(anchor: &MessageId) -> TransitionResult {
    TransitionResult::new(SyncState::Idle).with_effect(Effect::notify(Notification::ResetConfirmed {
        anchor: anchor.clone(),
    }))
}

/// Resetting + `ResetFailed` -> Idle with the pre-reset history restored
pub(super) fn roll_back(
    anchor: &MessageId,
    previous_snapshot: &[Message],
    error: ServiceError,
) -> TransitionResult {
    TransitionResult::new(SyncState::Idle)
        .with_effect(Effect::RestoreSnapshot {
            messages: previous_snapshot.to_vec(),
        })
        .with_effect(Effect::notify(Notification::ResetFailed {
            anchor: anchor.clone(),
            error,
        }))
}
