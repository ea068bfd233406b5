// src/error.rs

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Why an exam can't be started right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    NotYetOpen,
    Closed,
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (malformed input)
    BadRequest(String),

    // 400 Bad Request (missing or invalid fields on create/update)
    Validation(String),

    // 401 Unauthorized (no identity)
    AuthError(String),

    // 403 Forbidden (role or ownership mismatch)
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 400 Bad Request, start attempted outside the exam window
    ExamNotOpen(WindowState),

    // 409 Conflict, duplicate start or submit of a finished session
    AlreadySubmitted,

    // 409 Conflict, violation reported against a session that isn't in progress
    SessionNotActive,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

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
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Unauthorized(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ExamNotOpen(WindowState::NotYetOpen) => (
                StatusCode::BAD_REQUEST,
                "Exam has not started yet".to_string(),
            ),
            AppError::ExamNotOpen(WindowState::Closed) => (
                StatusCode::BAD_REQUEST,
                "Exam time is over".to_string(),
            ),
            AppError::AlreadySubmitted => (
                StatusCode::CONFLICT,
                "Exam already submitted".to_string(),
            ),
            AppError::SessionNotActive => (
                StatusCode::CONFLICT,
                "No active exam session".to_string(),
            ),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Malformed or mistyped request bodies.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
