//! Conversation synchronization state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! `submission` and `reset` hold the two flows; `transition` dispatches
//! between them and enforces that only one runs at a time.

mod effect;
pub mod event;
mod reset;
pub mod state;
mod submission;
pub(crate) mod transition;


pub use effect::{Effect, Notification};
pub use event::Event;
pub use state::SyncState;
pub use transition::{transition, TransitionError, TransitionResult};
