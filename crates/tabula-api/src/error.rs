//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tabula_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Core error: {0}")]
    Core(#[from] tabula_core::CoreError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
            ApiError::Core(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                e.to_string(),
            ),
            ApiError::Auth(e) => match e {
                AuthError::InvalidNonce => (
                    StatusCode::FORBIDDEN,
                    "INVALID_NONCE",
                    "The link you followed has expired".to_string(),
                ),
                AuthError::NonceKey(_) | AuthError::PasswordHash(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal error".to_string(),
                ),
                _ => (StatusCode::UNAUTHORIZED, "AUTH_ERROR", e.to_string()),
            },
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = axum::Json(json!({
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
