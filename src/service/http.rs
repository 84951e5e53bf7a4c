//! HTTP implementation of the negotiation service
//!
//! Wire contract:
//! - `POST /negotiation/{negotiation_id}/messages` with `{id, role, content}`,
//!   answered by `201` and `{id?, role, content}`
//! - `POST /negotiation/{negotiation_id}/messages/{message_id}/reset`,
//!   answered by `204`

use super::{NegotiationService, ServiceError};
use crate::conversation::{Message, MessageId, NegotiationId, Role};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest slice of an error body echoed into error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct SubmitMessageRequest<'a> {
    id: &'a MessageId,
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitMessageResponse {
    #[serde(default)]
    id: Option<MessageId>,
    role: Role,
    content: String,
}

/// Negotiation service speaking JSON over HTTP
pub struct HttpNegotiationService {
    client: Client,
    base_url: Url,
}

impl HttpNegotiationService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| {
                ServiceError::invalid_request(format!("Invalid base URL {base_url}: {e}"))
            })?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::invalid_request(format!(
                "Base URL {base_url} cannot carry a path"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::invalid_request("Base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post(
        &self,
        url: Url,
        body: Option<&SubmitMessageRequest<'_>>,
    ) -> Result<(u16, String), ServiceError> {
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                ServiceError::network(format!("Connection failed: {e}"))
            } else {
                ServiceError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::network(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            let excerpt: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(ServiceError::status(
                status.as_u16(),
                format!("HTTP {}: {}", status.as_u16(), excerpt),
            ));
        }

        Ok((status.as_u16(), text))
    }
}

#[async_trait]
impl NegotiationService for HttpNegotiationService {
    async fn submit_message(
        &self,
        negotiation_id: &NegotiationId,
        message: &Message,
    ) -> Result<Message, ServiceError> {
        let url = self.endpoint(&["negotiation", negotiation_id.as_str(), "messages"])?;
        let body = SubmitMessageRequest {
            id: &message.id,
            role: message.role,
            content: &message.content,
        };

        let (status, text) = self.post(url, Some(&body)).await?;
        let reply: SubmitMessageResponse = serde_json::from_str(&text).map_err(|e| {
            ServiceError::invalid_response(format!("Failed to parse reply (HTTP {status}): {e}"))
        })?;

        let id = reply.id.unwrap_or_else(|| {
            let id = MessageId::generate();
            tracing::debug!(message_id = %id, "Reply carried no id, assigned one locally");
            id
        });

        Ok(Message::new(id, reply.role, reply.content))
    }

    async fn reset_to(
        &self,
        negotiation_id: &NegotiationId,
        message_id: &MessageId,
    ) -> Result<(), ServiceError> {
        let url = self.endpoint(&[
            "negotiation",
            negotiation_id.as_str(),
            "messages",
            message_id.as_str(),
            "reset",
        ])?;
        self.post(url, None).await?;
        Ok(())
    }
}
