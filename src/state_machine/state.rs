//! Synchronization state types

use crate::conversation::{Message, MessageId};

/// Controller state, shared by the submission and reset flows.
///
/// Anything other than `Idle` means an operation is in flight and every new
/// user intent is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Ready for user input, no pending operations
    #[default]
    Idle,

    /// Optimistic user message appended, service reply outstanding
    Submitting {
        /// The optimistic message, last in the store until reconciled
        pending: Message,
    },

    /// History truncated locally, server confirmation outstanding
    Resetting {
        anchor: MessageId,
        /// Full sequence as it was before truncation, for rollback
        previous_snapshot: Vec<Message>,
    },
}

impl SyncState {
    /// Whether an operation is in flight
    pub fn is_busy(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Submitting { .. } => "submitting",
            SyncState::Resetting { .. } => "resetting",
        }
    }
}
