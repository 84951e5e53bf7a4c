//! Handle through which a presentation layer drives a conversation runtime

use super::{Command, ConversationView, ControllerError, Outcome};
use crate::conversation::{Message, MessageId, NegotiationId};
use crate::state_machine::{Event, Notification};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Cloneable handle to a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    negotiation_id: NegotiationId,
    command_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<ConversationView>,
    notify_tx: broadcast::Sender<Notification>,
    shutdown: CancellationToken,
}

impl ConversationHandle {
    pub(super) fn new(
        negotiation_id: NegotiationId,
        command_tx: mpsc::Sender<Command>,
        view_rx: watch::Receiver<ConversationView>,
        notify_tx: broadcast::Sender<Notification>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            negotiation_id,
            command_tx,
            view_rx,
            notify_tx,
            shutdown,
        }
    }

    pub fn negotiation_id(&self) -> &NegotiationId {
        &self.negotiation_id
    }

    /// Send a user message.
    ///
    /// The optimistic user message is visible in the view as soon as the
    /// runtime accepts the intent; the returned future resolves once the
    /// service has answered, with the assistant reply.
    pub async fn submit(&self, text: impl Into<String>) -> Result<Message, ControllerError> {
        self.submit_as(MessageId::generate(), text.into()).await
    }

    /// Submit with a caller-chosen id for the optimistic user message
    pub(crate) async fn submit_as(
        &self,
        message_id: MessageId,
        text: String,
    ) -> Result<Message, ControllerError> {
        let event = Event::UserSubmit { message_id, text };
        match self.send_intent(event).await? {
            Outcome::Reconciled(reply) => Ok(reply),
            other => Err(unexpected(&other)),
        }
    }

    /// Rewind the conversation to an assistant message, locally and on the server
    pub async fn reset_to(&self, message_id: MessageId) -> Result<(), ControllerError> {
        match self.send_intent(Event::UserReset { message_id }).await? {
            Outcome::ResetConfirmed(_) => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Handle a click on a message. Returns whether a reset was performed;
    /// selecting a user message does nothing.
    pub async fn select_message(&self, message_id: MessageId) -> Result<bool, ControllerError> {
        match self.send_intent(Event::UserSelect { message_id }).await? {
            Outcome::ResetConfirmed(_) => Ok(true),
            Outcome::Ignored => Ok(false),
            other @ Outcome::Reconciled(_) => Err(unexpected(&other)),
        }
    }

    /// Mirror the presentation layer's input field
    pub async fn update_draft(&self, text: impl Into<String>) -> Result<(), ControllerError> {
        self.command_tx
            .send(Command::UpdateDraft(text.into()))
            .await
            .map_err(|_| ControllerError::Stopped)
    }

    /// Messages as currently shown, including any optimistic entry
    pub fn current_messages(&self) -> Vec<Message> {
        self.view_rx.borrow().messages.clone()
    }

    pub fn view(&self) -> ConversationView {
        self.view_rx.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.view_rx.borrow().busy
    }

    /// Subscribe to outcome notifications
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    /// Stop the runtime. A caller still waiting on an operation gets `Stopped`.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn send_intent(&self, event: Event) -> Result<Outcome, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Intent {
                event,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ControllerError::Stopped)?;
        reply_rx.await.map_err(|_| ControllerError::Stopped)?
    }
}

fn unexpected(outcome: &Outcome) -> ControllerError {
    ControllerError::Internal(format!("Unexpected outcome: {outcome:?}"))
}
