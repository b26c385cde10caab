// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid credentials ({remaining_attempts} attempts remaining)")]
    InvalidCredentials { remaining_attempts: u32 },

    #[error("Client address is temporarily blocked")]
    IpBlocked,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Insufficient privileges: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
            AppError::IpBlocked | AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::Io(_) | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials { .. } => "AUTH_002",
            AppError::IpBlocked => "AUTH_003",
            AppError::Forbidden(_) => "AUTH_004",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidCredentials { remaining_attempts } => {
                format!("Invalid credentials. {remaining_attempts} attempts remaining.")
            }
            AppError::IpBlocked => {
                "Too many failed attempts. Please try again later.".to_string()
            }
            AppError::RateLimitExceeded => {
                "Rate limit exceeded, please try again later".to_string()
            }
            AppError::Forbidden(_) => "Insufficient privileges".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::Internal(_) | AppError::Io(_) => {
                "An internal server error occurred".to_string()
            }
            AppError::Json(_) => "Invalid request format".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let mut error = serde_json::json!({
            "code": error_code,
            "message": message,
        });
        if let AppError::InvalidCredentials { remaining_attempts } = self {
            error["remaining_attempts"] = remaining_attempts.into();
        }

        (status, axum::Json(serde_json::json!({ "error": error }))).into_response()
    }
}
