//! Gateway error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Insufficient role")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Not authenticated"),
            GatewayError::Forbidden => (StatusCode::FORBIDDEN, "Insufficient role"),
            GatewayError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            GatewayError::InvalidRole(_) => (StatusCode::BAD_REQUEST, "Unknown role"),
            GatewayError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            GatewayError::InvalidOrExpiredToken => {
                (StatusCode::UNAUTHORIZED, "Invalid or expired token")
            }
            GatewayError::Upstream(msg) => {
                // Details stay server-side; clients get a generic message.
                tracing::error!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "Upstream service failed")
            }
            GatewayError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "success": false, "reason": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<pagedesk_core::Error> for GatewayError {
    fn from(e: pagedesk_core::Error) -> Self {
        use pagedesk_core::Error as CoreError;
        match e {
            CoreError::TokenExpired | CoreError::TokenInvalid(_) => {
                GatewayError::InvalidOrExpiredToken
            }
            CoreError::InvalidRole(role) => GatewayError::InvalidRole(role),
            CoreError::InvalidStatus(status) => {
                GatewayError::Validation(format!("unknown status: {}", status))
            }
            CoreError::Policy(violation) => GatewayError::Validation(violation.to_string()),
            CoreError::Json(e) => GatewayError::Internal(e.to_string()),
        }
    }
}
