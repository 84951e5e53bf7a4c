//! Conversation runtime executor

use super::{Command, ConversationHandle, ConversationView, ControllerError, Outcome, Reply};
use crate::conversation::{
    ConversationStore, Message, MessageId, Negotiation, NegotiationId, StoreError,
};
use crate::service::NegotiationService;
use crate::state_machine::{transition, Effect, Event, Notification, SyncState};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

/// Generic conversation runtime that can work with any negotiation service
pub struct ConversationRuntime<S>
where
    S: NegotiationService + 'static,
{
    negotiation_id: NegotiationId,
    state: SyncState,
    store: ConversationStore,
    draft: String,
    service: Arc<S>,
    command_rx: mpsc::Receiver<Command>,
    /// Outcomes of spawned service calls
    outcome_tx: mpsc::Sender<Event>,
    outcome_rx: mpsc::Receiver<Event>,
    view_tx: watch::Sender<ConversationView>,
    notify_tx: broadcast::Sender<Notification>,
    /// Caller waiting for the in-flight operation to settle
    pending_reply: Option<Reply>,
    shutdown: CancellationToken,
}

impl<S> ConversationRuntime<S>
where
    S: NegotiationService + 'static,
{
    /// Build a runtime seeded with `negotiation` and a handle bound to it.
    /// The runtime does nothing until [`run`](Self::run) is awaited.
    pub fn new(
        negotiation: Negotiation,
        service: S,
    ) -> Result<(Self, ConversationHandle), StoreError> {
        let store = ConversationStore::seeded(negotiation.messages)?;
        let negotiation_id = negotiation.id;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (outcome_tx, outcome_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (view_tx, view_rx) = watch::channel(ConversationView {
            negotiation_id: negotiation_id.clone(),
            messages: store.snapshot(),
            draft: String::new(),
            busy: false,
        });
        let shutdown = CancellationToken::new();

        let handle = ConversationHandle::new(
            negotiation_id.clone(),
            command_tx,
            view_rx,
            notify_tx.clone(),
            shutdown.clone(),
        );

        let runtime = Self {
            negotiation_id,
            state: SyncState::Idle,
            store,
            draft: String::new(),
            service: Arc::new(service),
            command_rx,
            outcome_tx,
            outcome_rx,
            view_tx,
            notify_tx,
            pending_reply: None,
            shutdown,
        };

        Ok((runtime, handle))
    }

    /// Seed a runtime and start it on the current tokio runtime
    pub fn spawn(negotiation: Negotiation, service: S) -> Result<ConversationHandle, StoreError> {
        let (runtime, handle) = Self::new(negotiation, service)?;
        tokio::spawn(runtime.run());
        Ok(handle)
    }

    pub async fn run(mut self) {
        tracing::info!(
            negotiation_id = %self.negotiation_id,
            messages = self.store.len(),
            "Starting conversation runtime"
        );

        // Process commands in a loop - no recursion
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                command = self.command_rx.recv() => match command {
                    Some(command) => self.process_command(command),
                    // Every handle is gone, nobody is left to render or reply to
                    None => break,
                },
                Some(event) = self.outcome_rx.recv() => self.process_outcome(event),
            }
        }

        if let Some(reply) = self.pending_reply.take() {
            let _ = reply.send(Err(ControllerError::Stopped));
        }

        tracing::info!(negotiation_id = %self.negotiation_id, "Conversation runtime stopped");
    }

    fn process_command(&mut self, command: Command) {
        match command {
            Command::Intent { event, reply } => self.process_intent(event, reply),
            Command::UpdateDraft(text) => {
                self.draft = text;
                self.publish_view();
            }
        }
    }

    fn process_intent(&mut self, event: Event, reply: Reply) {
        let event_name = event.name();
        let result = match transition(&self.state, &self.store, event) {
            Ok(r) => r,
            Err(e) => {
                // Rejections are synchronous and leave the store untouched
                tracing::debug!(
                    event = event_name,
                    state = self.state.name(),
                    error = %e,
                    "Intent rejected"
                );
                let _ = reply.send(Err(e.into()));
                return;
            }
        };

        self.state = result.new_state;
        tracing::debug!(event = event_name, state = self.state.name(), "Intent accepted");

        if let Err(e) = self.execute_effects(result.effects) {
            self.fail_internal(&e);
            let _ = reply.send(Err(e.into()));
            return;
        }

        if self.state.is_busy() {
            self.pending_reply = Some(reply);
        } else {
            let _ = reply.send(Ok(Outcome::Ignored));
        }
    }

    fn process_outcome(&mut self, event: Event) {
        let event_name = event.name();
        let result = match transition(&self.state, &self.store, event) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    event = event_name,
                    state = self.state.name(),
                    error = %e,
                    "Dropping service outcome"
                );
                return;
            }
        };

        self.state = result.new_state;
        tracing::debug!(event = event_name, state = self.state.name(), "Service outcome applied");

        if let Err(e) = self.execute_effects(result.effects) {
            self.fail_internal(&e);
        }
    }

    /// Execute effects in order, publishing the view before any service call
    /// so optimistic changes are visible while the request is in flight
    fn execute_effects(&mut self, effects: Vec<Effect>) -> Result<(), StoreError> {
        for effect in effects {
            if effect.is_service_call() {
                self.publish_view();
            }
            self.execute_effect(effect)?;
        }
        self.publish_view();
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) -> Result<(), StoreError> {
        match effect {
            Effect::AppendMessage { message } => {
                tracing::debug!(
                    message_id = %message.id,
                    role = %message.role,
                    "Appending message"
                );
                self.store.append(message)?;
            }

            Effect::RemoveLast => {
                let removed = self.store.remove_last()?;
                tracing::info!(message_id = %removed.id, "Rolled back optimistic message");
            }

            Effect::TruncateAfter { message_id } => {
                let removed = self.store.truncate_after(&message_id)?;
                tracing::debug!(
                    anchor = %message_id,
                    removed = removed.len(),
                    "Truncated conversation"
                );
            }

            Effect::RestoreSnapshot { messages } => {
                tracing::info!(messages = messages.len(), "Restoring conversation snapshot");
                self.store.restore(messages)?;
            }

            Effect::ClearDraft => self.draft.clear(),

            Effect::SubmitMessage { message } => self.spawn_submit(message),

            Effect::ResetOnServer { message_id } => self.spawn_reset(message_id),

            Effect::Notify(notification) => {
                self.settle_pending(&notification);
                // No subscribers is fine
                let _ = self.notify_tx.send(notification);
            }
        }
        Ok(())
    }

    fn spawn_submit(&self, message: Message) {
        let service = self.service.clone();
        let outcome_tx = self.outcome_tx.clone();
        let negotiation_id = self.negotiation_id.clone();

        tokio::spawn(async move {
            tracing::info!(message_id = %message.id, "Submitting message (background)");
            let event = match service.submit_message(&negotiation_id, &message).await {
                Ok(reply) => Event::SubmitSucceeded { reply },
                Err(error) => Event::SubmitFailed { error },
            };
            let _ = outcome_tx.send(event).await;
        });
    }

    fn spawn_reset(&self, message_id: MessageId) {
        let service = self.service.clone();
        let outcome_tx = self.outcome_tx.clone();
        let negotiation_id = self.negotiation_id.clone();

        tokio::spawn(async move {
            tracing::info!(anchor = %message_id, "Resetting conversation (background)");
            let event = match service.reset_to(&negotiation_id, &message_id).await {
                Ok(()) => Event::ResetSucceeded,
                Err(error) => Event::ResetFailed { error },
            };
            let _ = outcome_tx.send(event).await;
        });
    }

    /// Answer the caller waiting on the in-flight operation
    fn settle_pending(&mut self, notification: &Notification) {
        let Some(reply) = self.pending_reply.take() else {
            return;
        };

        let result = match notification {
            Notification::Reconciled { reply } => Ok(Outcome::Reconciled(reply.clone())),
            Notification::SubmissionFailed { error, .. } => {
                Err(ControllerError::SubmissionFailed(error.clone()))
            }
            Notification::ResetConfirmed { anchor } => Ok(Outcome::ResetConfirmed(anchor.clone())),
            Notification::ResetFailed { error, .. } => {
                Err(ControllerError::ResetFailed(error.clone()))
            }
            Notification::Internal { message } => Err(ControllerError::Internal(message.clone())),
        };
        let _ = reply.send(result);
    }

    /// A store contract was broken: log, go back to idle and tell everyone
    fn fail_internal(&mut self, error: &StoreError) {
        tracing::error!(
            negotiation_id = %self.negotiation_id,
            state = self.state.name(),
            error = %error,
            "Store contract violated"
        );
        self.state = SyncState::Idle;
        let notification = Notification::Internal {
            message: error.to_string(),
        };
        self.settle_pending(&notification);
        let _ = self.notify_tx.send(notification);
        self.publish_view();
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(ConversationView {
            negotiation_id: self.negotiation_id.clone(),
            messages: self.store.snapshot(),
            draft: self.draft.clone(),
            busy: self.state.is_busy(),
        });
    }
}
