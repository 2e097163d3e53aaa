//! Error conditions callers branch on.
//!
//! Most operations return [`anyhow::Result`]; the variants below are wrapped
//! inside it and recovered with `downcast_ref` where behaviour depends on the
//! kind of failure (HTTP status mapping in the server, readiness timeouts in
//! the CLI).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or invalid configuration (API keys, environment, settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The vector index did not report readiness within the retry policy.
    #[error("index '{name}' not ready after {attempts} attempts")]
    IndexNotReady { name: String, attempts: u32 },

    /// A remote API answered with a non-success status.
    #[error("{service} API error {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// A remote API answered 2xx with a body we could not interpret.
    #[error("invalid {service} response: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error("embedding provider is disabled")]
    EmbeddingDisabled,

    #[error("query must not be empty")]
    EmptyQuery,
}

impl RagError {
    pub fn config(message: impl Into<String>) -> Self {
        RagError::Configuration(message.into())
    }

    pub fn invalid_response(service: &'static str, reason: impl Into<String>) -> Self {
        RagError::InvalidResponse {
            service,
            reason: reason.into(),
        }
    }
}
