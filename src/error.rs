//! Domain-specific error types for insight-lens

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Main error type for the insight-lens server
#[derive(Error, Debug)]
pub enum LensError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LensError {
    pub fn validation(message: impl Into<String>) -> Self {
        LensError::Validation {
            message: message.into(),
        }
    }
}

// CSV problems surface as user-facing validation errors, not crashes.
impl From<csv::Error> for LensError {
    fn from(err: csv::Error) -> Self {
        LensError::Validation {
            message: format!("CSV parse error: {}", err),
        }
    }
}

/// Convert LensError to an HTTP response: validation problems are the
/// caller's fault, everything else is a server error.
impl IntoResponse for LensError {
    fn into_response(self) -> Response {
        let status = match &self {
            LensError::Validation { .. } => StatusCode::BAD_REQUEST,
            LensError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            json!({
                "error": {
                    "code": status.as_u16(),
                    "message": self.to_string(),
                }
            })
            .to_string(),
        )
            .into_response()
    }
}

/// Result type alias for insight-lens operations
pub type Result<T> = std::result::Result<T, LensError>;
