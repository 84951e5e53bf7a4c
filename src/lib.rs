//! Negotiator client - optimistic chat synchronization
//!
//! Keeps a local negotiation transcript in step with a remote negotiation
//! service. User messages appear immediately and are rolled back if the
//! server rejects them; the conversation can be rewound to any assistant
//! message.

pub mod config;
pub mod conversation;
pub mod runtime;
pub mod service;
pub mod state_machine;
