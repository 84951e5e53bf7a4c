//! In-memory message sequence for a single negotiation
//!
//! The store has no network awareness. It enforces id uniqueness and offers
//! the suffix-only mutations the controllers need: append, remove-last,
//! truncate-after and wholesale restore.

use super::message::{Message, MessageId, Role};
use std::collections::HashSet;
use thiserror::Error;

/// Store contract violations. These indicate a controller bug, not a user error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("message id {0} is already present in the conversation")]
    DuplicateMessageId(MessageId),
    #[error("message {0} is not part of the conversation")]
    MessageNotFound(MessageId),
    #[error("conversation is empty, nothing to remove")]
    EmptyConversation,
}

/// Ordered message sequence with unique ids
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an initial history.
    ///
    /// System messages are dropped: they are prompt scaffolding, not part of
    /// the visible exchange.
    pub fn seeded(messages: impl IntoIterator<Item = Message>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for message in messages {
            if message.role == Role::System {
                tracing::debug!(message_id = %message.id, "Skipping system message in seed");
                continue;
            }
            store.append(message)?;
        }
        Ok(store)
    }

    pub fn append(&mut self, message: Message) -> Result<(), StoreError> {
        if self.ids.contains(&message.id) {
            return Err(StoreError::DuplicateMessageId(message.id));
        }
        self.ids.insert(message.id.clone());
        self.messages.push(message);
        Ok(())
    }

    /// Remove the most recent message (rollback of an optimistic append)
    pub fn remove_last(&mut self) -> Result<Message, StoreError> {
        let message = self.messages.pop().ok_or(StoreError::EmptyConversation)?;
        self.ids.remove(&message.id);
        Ok(message)
    }

    /// Drop every message positioned after `message_id`, keeping the target.
    /// Returns the removed suffix in conversation order.
    pub fn truncate_after(&mut self, message_id: &MessageId) -> Result<Vec<Message>, StoreError> {
        let position = self
            .position(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.clone()))?;

        let removed = self.messages.split_off(position + 1);
        for message in &removed {
            self.ids.remove(&message.id);
        }
        Ok(removed)
    }

    /// Replace the whole sequence with a previously taken snapshot
    pub fn restore(&mut self, snapshot: Vec<Message>) -> Result<(), StoreError> {
        let mut ids = HashSet::with_capacity(snapshot.len());
        for message in &snapshot {
            if !ids.insert(message.id.clone()) {
                return Err(StoreError::DuplicateMessageId(message.id.clone()));
            }
        }
        self.messages = snapshot;
        self.ids = ids;
        Ok(())
    }

    /// Immutable copy of the current sequence
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn get(&self, message_id: &MessageId) -> Option<&Message> {
        self.position(message_id).map(|index| &self.messages[index])
    }

    pub fn contains(&self, message_id: &MessageId) -> bool {
        self.ids.contains(message_id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    fn position(&self, message_id: &MessageId) -> Option<usize> {
        if !self.ids.contains(message_id) {
            return None;
        }
        self.messages.iter().position(|m| &m.id == message_id)
    }
}
