//! Conversation data: messages, negotiations and the message store

mod message;
mod store;

pub use message::{Message, MessageId, Negotiation, NegotiationId, Role};
pub use store::{ConversationStore, StoreError};
