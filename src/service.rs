//! Negotiation service abstraction
//!
//! The controller only talks to the server through [`NegotiationService`].
//! [`HttpNegotiationService`] is the production implementation.

mod error;
mod http;

pub use error::{ServiceError, ServiceErrorKind};
pub use http::HttpNegotiationService;

use crate::conversation::{Message, MessageId, NegotiationId};
use async_trait::async_trait;
use std::sync::Arc;

/// Server-side operations on a negotiation
#[async_trait]
pub trait NegotiationService: Send + Sync {
    /// Submit a user message and return the assistant's reply
    async fn submit_message(
        &self,
        negotiation_id: &NegotiationId,
        message: &Message,
    ) -> Result<Message, ServiceError>;

    /// Discard every message after `message_id` on the server
    async fn reset_to(
        &self,
        negotiation_id: &NegotiationId,
        message_id: &MessageId,
    ) -> Result<(), ServiceError>;
}

#[async_trait]
impl<T: NegotiationService + ?Sized> NegotiationService for Arc<T> {
    async fn submit_message(
        &self,
        negotiation_id: &NegotiationId,
        message: &Message,
    ) -> Result<Message, ServiceError> {
        (**self).submit_message(negotiation_id, message).await
    }

    async fn reset_to(
        &self,
        negotiation_id: &NegotiationId,
        message_id: &MessageId,
    ) -> Result<(), ServiceError> {
        (**self).reset_to(negotiation_id, message_id).await
    }
}

/// Logging wrapper for negotiation services
pub struct LoggingNegotiationService<S> {
    inner: S,
}

impl<S: NegotiationService> LoggingNegotiationService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: NegotiationService> NegotiationService for LoggingNegotiationService<S> {
    async fn submit_message(
        &self,
        negotiation_id: &NegotiationId,
        message: &Message,
    ) -> Result<Message, ServiceError> {
        let start = std::time::Instant::now();
        let result = self.inner.submit_message(negotiation_id, message).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    negotiation_id = %negotiation_id,
                    message_id = %message.id,
                    reply_id = %reply.id,
                    duration_ms = %duration.as_millis(),
                    "Message submitted"
                );
            }
            Err(e) => {
                tracing::error!(
                    negotiation_id = %negotiation_id,
                    message_id = %message.id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    transient = e.kind.is_transient(),
                    "Message submission failed"
                );
            }
        }

        result
    }

    async fn reset_to(
        &self,
        negotiation_id: &NegotiationId,
        message_id: &MessageId,
    ) -> Result<(), ServiceError> {
        let start = std::time::Instant::now();
        let result = self.inner.reset_to(negotiation_id, message_id).await;
        let duration = start.elapsed();

        match &result {
            Ok(()) => {
                tracing::info!(
                    negotiation_id = %negotiation_id,
                    message_id = %message_id,
                    duration_ms = %duration.as_millis(),
                    "Negotiation reset"
                );
            }
            Err(e) => {
                tracing::error!(
                    negotiation_id = %negotiation_id,
                    message_id = %message_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    transient = e.kind.is_transient(),
                    "Negotiation reset failed"
                );
            }
        }

        result
    }
}
