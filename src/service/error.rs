//! Negotiation service error types

use thiserror::Error;

/// Service error with classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Network, message)
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Status(code), message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InvalidResponse, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InvalidRequest, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Unknown, message)
    }
}

/// Error classification, so the presentation layer can word its retry hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Connection refused, timeouts
    Network,
    /// Server answered with a non-2xx status
    Status(u16),
    /// 2xx answer whose body could not be understood
    InvalidResponse,
    /// Request could not be built (bad base URL, unencodable id)
    InvalidRequest,
    Unknown,
}

impl ServiceErrorKind {
    /// Whether re-sending the same request could plausibly succeed
    pub fn is_transient(self) -> bool {
        match self {
            Self::Network => true,
            Self::Status(code) => code == 429 || code >= 500,
            Self::InvalidResponse | Self::InvalidRequest | Self::Unknown => false,
        }
    }
}
