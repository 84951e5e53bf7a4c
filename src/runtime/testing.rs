//! Mock implementations for testing
//!
//! These mocks enable integration testing of the runtime without real I/O.

use crate::conversation::{Message, MessageId, NegotiationId};
use crate::service::{NegotiationService, ServiceError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

// ============================================================================
// Mock Negotiation Service
// ============================================================================

/// A recorded service call
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Submit {
        negotiation_id: NegotiationId,
        message: Message,
    },
    Reset {
        negotiation_id: NegotiationId,
        message_id: MessageId,
    },
}

/// Mock service that returns queued results
#[derive(Default)]
pub struct MockNegotiationService {
    replies: Mutex<VecDeque<Result<Message, ServiceError>>>,
    resets: Mutex<VecDeque<Result<(), ServiceError>>>,
    /// Record of all calls made
    pub calls: Mutex<Vec<ServiceCall>>,
}

impl MockNegotiationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an assistant reply with the given content
    pub fn queue_reply(&self, content: &str) {
        self.queue_reply_message(Message::assistant(MessageId::generate(), content));
    }

    pub fn queue_reply_message(&self, message: Message) {
        self.replies.lock().unwrap().push_back(Ok(message));
    }

    pub fn queue_submit_error(&self, error: ServiceError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_reset_ok(&self) {
        self.resets.lock().unwrap().push_back(Ok(()));
    }

    pub fn queue_reset_error(&self, error: ServiceError) {
        self.resets.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded calls
    pub fn recorded_calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NegotiationService for MockNegotiationService {
    async fn submit_message(
        &self,
        negotiation_id: &NegotiationId,
        message: &Message,
    ) -> Result<Message, ServiceError> {
        self.calls.lock().unwrap().push(ServiceCall::Submit {
            negotiation_id: negotiation_id.clone(),
            message: message.clone(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::network("No mock reply queued")))
    }

    async fn reset_to(
        &self,
        negotiation_id: &NegotiationId,
        message_id: &MessageId,
    ) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push(ServiceCall::Reset {
            negotiation_id: negotiation_id.clone(),
            message_id: message_id.clone(),
        });
        self.resets
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::network("No mock reset result queued")))
    }
}

// ============================================================================
// Gated Mock Service (for observing in-flight states)
// ============================================================================

/// Mock service whose calls block until the test releases them
pub struct GatedNegotiationService {
    pub inner: MockNegotiationService,
    gate: Semaphore,
    /// Notified when a call reaches the service
    pub call_started: Arc<Notify>,
}

impl GatedNegotiationService {
    pub fn new() -> Self {
        Self {
            inner: MockNegotiationService::new(),
            gate: Semaphore::new(0),
            call_started: Arc::new(Notify::new()),
        }
    }

    /// Let one blocked (or future) call complete
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    async fn pass_gate(&self) {
        // notify_one stores a permit, so a test that starts waiting late still wakes
        self.call_started.notify_one();
        self.gate.acquire().await.unwrap().forget();
    }
}

impl Default for GatedNegotiationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NegotiationService for GatedNegotiationService {
    async fn submit_message(
        &self,
        negotiation_id: &NegotiationId,
        message: &Message,
    ) -> Result<Message, ServiceError> {
        self.pass_gate().await;
        self.inner.submit_message(negotiation_id, message).await
    }

    async fn reset_to(
        &self,
        negotiation_id: &NegotiationId,
        message_id: &MessageId,
    ) -> Result<(), ServiceError> {
        self.pass_gate().await;
        self.inner.reset_to(negotiation_id, message_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Negotiation, Role};
    use crate::runtime::{ConversationHandle, ConversationRuntime, ControllerError};
    use crate::service::ServiceErrorKind;
    use crate::state_machine::Notification;
    use std::time::Duration;

    const ASSISTANT_ID: &str = "11111111-7981-4e69-b44e-c21b3f88213b";
    const USER_ID: &str = "22222222-7981-4e69-b44e-c21b3f88213b";

    fn fixture_negotiation() -> Negotiation {
        Negotiation::new(
            NegotiationId::new("negotiation-1234"),
            vec![
                Message::new(MessageId::new(ASSISTANT_ID), Role::Assistant, "hi there"),
                Message::new(MessageId::new(USER_ID), Role::User, "hi yourself"),
            ],
        )
    }

    fn spawn_with<S: NegotiationService + 'static>(service: S) -> ConversationHandle {
        ConversationRuntime::spawn(fixture_negotiation(), service).unwrap()
    }

    fn contents(messages: &[Message]) -> Vec<(Role, String)> {
        messages.iter().map(|m| (m.role, m.content.clone())).collect()
    }

    /// Wait for the gated service to receive a call, with a timeout so a
    /// broken runtime fails the test instead of hanging it
    async fn wait_for_call(service: &GatedNegotiationService) {
        tokio::time::timeout(Duration::from_secs(5), service.call_started.notified())
            .await
            .expect("service call never started");
    }

    #[tokio::test]
    async fn test_mock_service_records_calls() {
        let mock = MockNegotiationService::new();
        mock.queue_reply("Hello");

        let id = NegotiationId::new("n-1");
        let reply = mock.submit_message(&id, &Message::user("hi")).await.unwrap();
        assert_eq!(reply.content, "Hello");

        // Second call should fail (no more replies)
        assert!(mock.submit_message(&id, &Message::user("hi")).await.is_err());
        assert_eq!(mock.recorded_calls().len(), 2);
    }

    /// Submitting appends user message and reply, clears the draft
    #[tokio::test]
    async fn test_submit_round_trip() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_reply("assistant reply");
        let handle = spawn_with(service.clone());

        handle.update_draft("user message").await.unwrap();
        let reply = handle.submit("user message").await.unwrap();

        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "assistant reply");

        let view = handle.view();
        assert_eq!(
            contents(&view.messages),
            vec![
                (Role::Assistant, "hi there".to_string()),
                (Role::User, "hi yourself".to_string()),
                (Role::User, "user message".to_string()),
                (Role::Assistant, "assistant reply".to_string()),
            ]
        );
        assert_eq!(view.draft, "");
        assert!(!view.busy);

        // The optimistic message id is what the server received
        let calls = service.recorded_calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            ServiceCall::Submit {
                negotiation_id,
                message,
            } => {
                assert_eq!(negotiation_id.as_str(), "negotiation-1234");
                assert_eq!(message.id, view.messages[2].id);
                assert_eq!(message.content, "user message");
            }
            other => panic!("Expected submit call, got {other:?}"),
        }
    }

    /// The user message is visible before the service answers
    #[tokio::test]
    async fn test_submit_is_optimistic() {
        let service = Arc::new(GatedNegotiationService::new());
        service.inner.queue_reply("assistant reply");
        let handle = spawn_with(service.clone());

        handle.update_draft("x").await.unwrap();
        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit("x").await }
        });
        wait_for_call(&service).await;

        let view = handle.view();
        assert!(view.busy);
        assert_eq!(view.draft, "");
        let last = view.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "x");

        service.release();
        pending.await.unwrap().unwrap();
        assert_eq!(handle.current_messages().len(), 4);
    }

    /// A failed submission leaves no trace of the optimistic message
    #[tokio::test]
    async fn test_submit_failure_rolls_back() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_submit_error(ServiceError::status(500, "HTTP 500"));
        let handle = spawn_with(service);
        let mut notifications = handle.subscribe();
        let before = handle.current_messages();

        let err = handle.submit("  cheaper please  ").await.unwrap_err();

        assert!(matches!(
            err,
            ControllerError::SubmissionFailed(ref e) if e.kind == ServiceErrorKind::Status(500)
        ));
        assert_eq!(handle.current_messages(), before);
        assert!(!handle.is_busy());

        match notifications.recv().await.unwrap() {
            Notification::SubmissionFailed { text, .. } => assert_eq!(text, "cheaper please"),
            other => panic!("Expected SubmissionFailed, got {other:?}"),
        }
    }

    /// Retrying after a failure is a fresh submission
    #[tokio::test]
    async fn test_retry_after_failure() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_submit_error(ServiceError::network("Connection failed"));
        service.queue_reply("second time lucky");
        let handle = spawn_with(service.clone());

        assert!(handle.submit("offer 20k").await.is_err());
        let reply = handle.submit("offer 20k").await.unwrap();

        assert_eq!(reply.content, "second time lucky");
        assert_eq!(handle.current_messages().len(), 4);
        assert_eq!(service.recorded_calls().len(), 2);
    }

    /// A second submission while one is in flight is rejected without mutation
    #[tokio::test]
    async fn test_submit_while_submitting_rejected() {
        let service = Arc::new(GatedNegotiationService::new());
        service.inner.queue_reply("assistant reply");
        let handle = spawn_with(service.clone());

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit("first").await }
        });
        wait_for_call(&service).await;
        let during = handle.current_messages();

        let err = handle.submit("second").await.unwrap_err();
        assert_eq!(err, ControllerError::SubmissionInProgress);
        assert_eq!(handle.current_messages(), during);

        let err = handle.reset_to(MessageId::new(ASSISTANT_ID)).await.unwrap_err();
        assert_eq!(err, ControllerError::SubmissionInProgress);

        service.release();
        first.await.unwrap().unwrap();
        assert_eq!(service.inner.recorded_calls().len(), 1);
    }

    /// A submission while a reset is in flight is rejected
    #[tokio::test]
    async fn test_submit_while_resetting_rejected() {
        let service = Arc::new(GatedNegotiationService::new());
        service.inner.queue_reset_ok();
        let handle = spawn_with(service.clone());

        let reset = tokio::spawn({
            let handle = handle.clone();
            async move { handle.reset_to(MessageId::new(ASSISTANT_ID)).await }
        });
        wait_for_call(&service).await;

        let err = handle.submit("sneaky").await.unwrap_err();
        assert_eq!(err, ControllerError::SubmissionInProgress);
        assert_eq!(handle.current_messages().len(), 1);

        service.release();
        reset.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_empty_submit_rejected() {
        let service = Arc::new(MockNegotiationService::new());
        let handle = spawn_with(service.clone());

        assert_eq!(handle.submit("   ").await.unwrap_err(), ControllerError::EmptyMessage);
        assert_eq!(handle.current_messages().len(), 2);
        assert!(service.recorded_calls().is_empty());
    }

    /// negotiation-1234: reset to the greeting drops the user's reply
    #[tokio::test]
    async fn test_reset_truncates() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_reset_ok();
        let handle = spawn_with(service.clone());

        handle.reset_to(MessageId::new(ASSISTANT_ID)).await.unwrap();

        let messages = handle.current_messages();
        assert_eq!(
            messages,
            vec![Message::new(
                MessageId::new(ASSISTANT_ID),
                Role::Assistant,
                "hi there"
            )]
        );
        assert_eq!(
            service.recorded_calls(),
            vec![ServiceCall::Reset {
                negotiation_id: NegotiationId::new("negotiation-1234"),
                message_id: MessageId::new(ASSISTANT_ID),
            }]
        );
    }

    /// The truncation is visible while the server call is in flight
    #[tokio::test]
    async fn test_reset_is_optimistic() {
        let service = Arc::new(GatedNegotiationService::new());
        service.inner.queue_reset_ok();
        let handle = spawn_with(service.clone());

        let reset = tokio::spawn({
            let handle = handle.clone();
            async move { handle.reset_to(MessageId::new(ASSISTANT_ID)).await }
        });
        wait_for_call(&service).await;

        assert_eq!(handle.current_messages().len(), 1);
        assert!(handle.is_busy());

        service.release();
        reset.await.unwrap().unwrap();
        assert!(!handle.is_busy());
    }

    /// A failed reset restores the full history
    #[tokio::test]
    async fn test_reset_failure_restores_snapshot() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_reset_error(ServiceError::status(404, "HTTP 404"));
        let handle = spawn_with(service);
        let mut notifications = handle.subscribe();
        let before = handle.current_messages();

        let err = handle.reset_to(MessageId::new(ASSISTANT_ID)).await.unwrap_err();

        assert!(matches!(err, ControllerError::ResetFailed(_)));
        assert_eq!(handle.current_messages(), before);
        assert!(matches!(
            notifications.recv().await.unwrap(),
            Notification::ResetFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_reset_to_user_message_rejected() {
        let service = Arc::new(MockNegotiationService::new());
        let handle = spawn_with(service.clone());

        let err = handle.reset_to(MessageId::new(USER_ID)).await.unwrap_err();

        assert_eq!(err, ControllerError::InvalidResetTarget(MessageId::new(USER_ID)));
        assert_eq!(handle.current_messages().len(), 2);
        assert!(service.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn test_select_message() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_reset_ok();
        let handle = spawn_with(service.clone());

        // Clicking the user's own message does nothing
        assert!(!handle.select_message(MessageId::new(USER_ID)).await.unwrap());
        assert_eq!(handle.current_messages().len(), 2);

        // Clicking the assistant message rewinds to it
        assert!(handle.select_message(MessageId::new(ASSISTANT_ID)).await.unwrap());
        assert_eq!(handle.current_messages().len(), 1);
        assert_eq!(service.recorded_calls().len(), 1);

        let err = handle.select_message(MessageId::new(USER_ID)).await.unwrap_err();
        assert_eq!(err, ControllerError::InvalidResetTarget(MessageId::new(USER_ID)));
    }

    /// Submit, then rewind past the new turn
    #[tokio::test]
    async fn test_reset_after_submit() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_reply("counter offer");
        service.queue_reset_ok();
        let handle = spawn_with(service);

        handle.submit("my offer").await.unwrap();
        assert_eq!(handle.current_messages().len(), 4);

        handle.reset_to(MessageId::new(ASSISTANT_ID)).await.unwrap();
        assert_eq!(
            contents(&handle.current_messages()),
            vec![(Role::Assistant, "hi there".to_string())]
        );
    }

    /// A server that keys replies by their text answers twice with the same
    /// id; both turns stay in the transcript
    #[tokio::test]
    async fn test_repeated_reply_id_kept_under_fresh_id() {
        let service = Arc::new(MockNegotiationService::new());
        let same = Message::assistant(MessageId::new("Sounds good."), "Sounds good.");
        service.queue_reply_message(same.clone());
        service.queue_reply_message(same);
        let handle = spawn_with(service.clone());

        let first = handle.submit("offer 20k").await.unwrap();
        let second = handle.submit("offer 25k").await.unwrap();

        assert_eq!(first.id, MessageId::new("Sounds good."));
        assert_ne!(second.id, first.id);
        assert_eq!(second.content, "Sounds good.");
        assert_eq!(service.recorded_calls().len(), 2);

        let messages = handle.current_messages();
        assert_eq!(
            contents(&messages[2..]),
            vec![
                (Role::User, "offer 20k".to_string()),
                (Role::Assistant, "Sounds good.".to_string()),
                (Role::User, "offer 25k".to_string()),
                (Role::Assistant, "Sounds good.".to_string()),
            ]
        );
        assert_eq!(messages[5].id, second.id);
    }

    /// A reply from the wrong role is rolled back like a failure
    #[tokio::test]
    async fn test_reply_from_user_role_rolled_back() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_reply_message(Message::new(MessageId::generate(), Role::User, "echo"));
        let handle = spawn_with(service);

        let err = handle.submit("hello").await.unwrap_err();

        assert!(matches!(
            err,
            ControllerError::SubmissionFailed(ref e) if e.kind == ServiceErrorKind::InvalidResponse
        ));
        assert_eq!(handle.current_messages().len(), 2);
    }

    #[tokio::test]
    async fn test_notifications_on_success() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_reply("assistant reply");
        service.queue_reset_ok();
        let handle = spawn_with(service);
        let mut notifications = handle.subscribe();

        let reply = handle.submit("hello").await.unwrap();
        assert_eq!(
            notifications.recv().await.unwrap(),
            Notification::Reconciled { reply }
        );

        handle.reset_to(MessageId::new(ASSISTANT_ID)).await.unwrap();
        assert_eq!(
            notifications.recv().await.unwrap(),
            Notification::ResetConfirmed {
                anchor: MessageId::new(ASSISTANT_ID)
            }
        );
    }

    /// Runtimes for different negotiations share nothing
    #[tokio::test]
    async fn test_negotiations_are_independent() {
        let gated = Arc::new(GatedNegotiationService::new());
        gated.inner.queue_reply("slow reply");
        let slow = spawn_with(gated.clone());

        let fast_service = Arc::new(MockNegotiationService::new());
        fast_service.queue_reply("fast reply");
        let fast = ConversationRuntime::spawn(
            Negotiation::empty(NegotiationId::new("negotiation-5678")),
            fast_service,
        )
        .unwrap();

        let pending = tokio::spawn({
            let slow = slow.clone();
            async move { slow.submit("first").await }
        });
        wait_for_call(&gated).await;

        // The other negotiation is not blocked by the in-flight submission
        let reply = fast.submit("hello").await.unwrap();
        assert_eq!(reply.content, "fast reply");
        assert_eq!(fast.current_messages().len(), 2);

        gated.release();
        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_fails_waiting_caller() {
        let service = Arc::new(GatedNegotiationService::new());
        let handle = spawn_with(service.clone());

        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit("never answered").await }
        });
        wait_for_call(&service).await;

        handle.shutdown();

        assert_eq!(pending.await.unwrap().unwrap_err(), ControllerError::Stopped);
        assert_eq!(handle.submit("late").await.unwrap_err(), ControllerError::Stopped);
    }

    /// A store contract violation returns the runtime to idle, tells the
    /// caller and subscribers, and leaves the conversation usable
    #[tokio::test]
    async fn test_store_violation_recovers_to_idle() {
        let service = Arc::new(MockNegotiationService::new());
        service.queue_reply("still here");
        let handle = spawn_with(service.clone());
        let mut notifications = handle.subscribe();
        let before = handle.current_messages();

        // Reusing an existing id makes the optimistic append fail
        let err = handle
            .submit_as(MessageId::new(ASSISTANT_ID), "clash".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::Internal(ref m) if m.contains(ASSISTANT_ID)));
        assert!(matches!(
            notifications.recv().await.unwrap(),
            Notification::Internal { .. }
        ));
        assert!(!handle.is_busy());
        assert_eq!(handle.current_messages(), before);
        assert!(service.recorded_calls().is_empty());

        let reply = handle.submit("after the clash").await.unwrap();
        assert_eq!(reply.content, "still here");
        assert_eq!(handle.current_messages().len(), 4);
    }

    #[tokio::test]
    async fn test_seed_filters_system_messages() {
        let negotiation = Negotiation::new(
            NegotiationId::new("n-1"),
            vec![
                Message::new(MessageId::new("s"), Role::System, "prompt"),
                Message::new(MessageId::new("a"), Role::Assistant, "hello"),
            ],
        );
        let handle =
            ConversationRuntime::spawn(negotiation, MockNegotiationService::new()).unwrap();
        assert_eq!(
            contents(&handle.current_messages()),
            vec![(Role::Assistant, "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn test_duplicate_seed_ids_rejected() {
        let negotiation = Negotiation::new(
            NegotiationId::new("n-1"),
            vec![
                Message::new(MessageId::new("a"), Role::Assistant, "hello"),
                Message::new(MessageId::new("a"), Role::User, "hello"),
            ],
        );
        assert!(ConversationRuntime::spawn(negotiation, MockNegotiationService::new()).is_err());
    }
}
