//! Error types for pagedesk-core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Unknown status: {0}")]
    InvalidStatus(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token invalid: {0}")]
    TokenInvalid(String),

    #[error("Webhook URL rejected: {0}")]
    Policy(#[from] crate::policy::PolicyViolation),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
            _ => Error::TokenInvalid(e.to_string()),
        }
    }
}
