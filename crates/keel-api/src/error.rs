//! API error types

use serde_json::{json, Value};
use thiserror::Error;

use crate::validation::ValidationError;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Errors surfaced as HTTP responses, plus registration failures.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    InputValidation(ValidationError),

    #[error(transparent)]
    ResponseValidation(ValidationError),

    #[error(transparent)]
    Handler(anyhow::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Request body too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Invalid route '{path}': {reason}")]
    Registration { path: String, reason: String },
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InputValidation(_) | ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::ResponseValidation(_)
            | ApiError::Handler(_)
            | ApiError::Registration { .. } => 500,
        }
    }

    /// JSON body sent to the client.
    pub fn to_body(&self) -> Value {
        match self {
            ApiError::InputValidation(err) => json!({
                "error": "Validation failed",
                "message": err.to_string(),
                "details": err.details_json(),
            }),
            ApiError::ResponseValidation(err) => json!({
                "error": "Response validation failed",
                "message": err.to_string(),
                "details": err.details_json(),
            }),
            ApiError::Handler(err) => {
                let message = err.to_string();
                let message = if message.trim().is_empty() {
                    UNEXPECTED_ERROR_MESSAGE.to_string()
                } else {
                    message
                };
                json!({"error": "Internal Server Error", "message": message})
            }
            ApiError::NotFound(message) => json!({"error": "Not Found", "message": message}),
            ApiError::BadRequest(message) => json!({"error": "Bad Request", "message": message}),
            ApiError::PayloadTooLarge { .. } => {
                json!({"error": "Payload Too Large", "message": self.to_string()})
            }
            ApiError::Registration { .. } => {
                json!({"error": "Internal Server Error", "message": self.to_string()})
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Handler(err)
    }
}
