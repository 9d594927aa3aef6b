//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource absent, or present but owned by another tenant.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violations and malformed input.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Repository error: {0}")]
    Repo(String),

    /// Upstream messaging API (WhatsApp Cloud API) failed.
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Forwarding failed: {0}")]
    Forward(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DomainError {
    pub fn not_found(what: &str) -> Self {
        DomainError::NotFound(format!("{} not found", what))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        DomainError::BadRequest(msg.into())
    }
}
