// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // 500 Internal Server Error
    #[error("internal error: {0}")]
    InternalServerError(String),

    // 400 Bad Request
    #[error("bad request: {0}")]
    BadRequest(String),

    // 401 Unauthorized
    #[error("unauthorized: {0}")]
    AuthError(String),

    // 403 Forbidden (e.g., another user's simulation)
    #[error("forbidden: {0}")]
    Forbidden(String),

    // 404 Not Found
    #[error("not found: {0}")]
    NotFound(String),

    // 409 Conflict (e.g., simulation already completed)
    #[error("conflict: {0}")]
    Conflict(String),

    // 429 Too Many Requests
    #[error("rate limited: {0}")]
    TooManyRequests(String),

    // 503, concurrent profile update kept losing after bounded retries
    #[error("concurrent update conflict: {0}")]
    RaceLoss(String),

    // 503, a collaborator (rate-limiter store, AI service) is down
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl AppError {
    pub fn is_race_loss(&self) -> bool {
        matches!(self, AppError::RaceLoss(_))
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            AppError::RaceLoss(msg) => {
                tracing::warn!("Profile update retries exhausted: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Please try again".to_string(),
                )
            }
            AppError::UpstreamUnavailable(msg) => {
                tracing::warn!("Upstream unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
