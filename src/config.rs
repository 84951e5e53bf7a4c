//! Client configuration read from the environment

use crate::conversation::{Negotiation, NegotiationId};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8081";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("Set NEGOTIATOR_NEGOTIATION_FILE or NEGOTIATOR_NEGOTIATION_ID")]
    MissingNegotiation,
    #[error("Failed to read negotiation file {path}: {source}")]
    ReadNegotiation {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse negotiation file {path}: {source}")]
    ParseNegotiation {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where the initial conversation comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationSource {
    /// JSON file holding `{id, messages}`
    File(PathBuf),
    /// Start with an empty history
    Id(NegotiationId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub negotiation: NegotiationSource,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("NEGOTIATOR_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let request_timeout = match lookup("NEGOTIATOR_REQUEST_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "NEGOTIATOR_REQUEST_TIMEOUT_SECS",
                        value,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        // A seed file wins over a bare id
        let negotiation = if let Some(path) = lookup("NEGOTIATOR_NEGOTIATION_FILE") {
            NegotiationSource::File(PathBuf::from(path))
        } else if let Some(id) = lookup("NEGOTIATOR_NEGOTIATION_ID") {
            if id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: "NEGOTIATOR_NEGOTIATION_ID",
                    value: id,
                });
            }
            NegotiationSource::Id(NegotiationId::new(id.trim()))
        } else {
            return Err(ConfigError::MissingNegotiation);
        };

        Ok(Self {
            base_url,
            request_timeout,
            negotiation,
        })
    }

    /// Load the negotiation the conversation is seeded with
    pub fn load_negotiation(&self) -> Result<Negotiation, ConfigError> {
        match &self.negotiation {
            NegotiationSource::Id(id) => Ok(Negotiation::empty(id.clone())),
            NegotiationSource::File(path) => {
                let json =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::ReadNegotiation {
                        path: path.clone(),
                        source,
                    })?;
                Negotiation::from_json(&json).map_err(|source| ConfigError::ParseNegotiation {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}
