//! Error types for the Firma API
//!
//! Signer-facing messages stay generic: they never include hashes, other
//! parties' data, or hints about which addresses exist. The one
//! deliberate exception is `remaining_attempts` on an OTP mismatch,
//! exposed as a UX aid.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Signature request not found")]
    NotFound,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Request is in a terminal state")]
    RequestTerminal,

    #[error("Forbidden")]
    Forbidden,

    #[error("Request has expired")]
    OtpExpired,

    #[error("Verification attempts exhausted")]
    OtpExhausted,

    #[error("Incorrect code")]
    OtpMismatch { remaining_attempts: i64 },

    #[error("No valid code outstanding; request a new one")]
    NoValidOtp,

    #[error("Too many attempts, slow down")]
    RateLimited,

    #[error("Could not deliver the code")]
    DeliveryFailure,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "Signature request not found".to_string(),
                None,
            ),
            ApiError::TokenInvalid => {
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string(), None)
            }
            ApiError::TokenExpired => {
                (StatusCode::UNAUTHORIZED, "Token expired".to_string(), None)
            }
            ApiError::RequestTerminal => (
                StatusCode::GONE,
                "Request is already closed".to_string(),
                None,
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string(), None),
            ApiError::OtpExpired => {
                (StatusCode::GONE, "Request has expired".to_string(), None)
            }
            ApiError::OtpExhausted => (
                StatusCode::GONE,
                "Verification attempts exhausted".to_string(),
                None,
            ),
            ApiError::OtpMismatch { remaining_attempts } => (
                StatusCode::BAD_REQUEST,
                "Incorrect code".to_string(),
                Some(json!({ "remainingAttempts": remaining_attempts })),
            ),
            ApiError::NoValidOtp => (
                StatusCode::BAD_REQUEST,
                "No valid code outstanding; request a new one".to_string(),
                None,
            ),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many attempts, slow down".to_string(),
                None,
            ),
            ApiError::DeliveryFailure => (
                StatusCode::BAD_GATEWAY,
                "Could not deliver the code".to_string(),
                None,
            ),
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                    None,
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": message,
            "status": status.as_u16(),
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}
