//! Error types for the service.
//!
//! Errors are converted to HTTP responses for API clients via `ResponseError`.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::fmt;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application error taxonomy.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    status: u16,
    error_type: &'static str,
    code: &'static str,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error, error_type, code) = match self {
            AppError::BadRequest(_) => ("Bad Request", "validation_error", "INVALID_REQUEST"),
            AppError::NotFound(_) => ("Not Found", "not_found_error", "VIDEO_NOT_FOUND"),
            AppError::Forbidden(_) => ("Forbidden", "authorization_error", "AUTHORIZATION_ERROR"),
            AppError::Conflict(_) => ("Conflict", "conflict_error", "VIDEO_NOT_TERMINAL"),
            AppError::Internal(_) => (
                "Internal Server Error",
                "server_error",
                "INTERNAL_SERVER_ERROR",
            ),
        };

        HttpResponse::build(status).json(ErrorBody {
            error,
            message: self.to_string(),
            status: status.as_u16(),
            error_type,
            code,
        })
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Errors that only ever occur inside the pipeline and are folded into
/// `Video.errors[]` / `status = failed` rather than surfaced to HTTP clients.
#[derive(Debug, Clone)]
pub enum PipelineError {
    ProbeTimeout,
    ProbeFailed(String),
    ValidationRejected(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ProbeTimeout => write!(f, "probe timed out"),
            PipelineError::ProbeFailed(msg) => write!(f, "probe failed: {}", msg),
            PipelineError::ValidationRejected(msg) => write!(f, "validation rejected: {}", msg),
        }
    }
}
