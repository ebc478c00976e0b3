//! Error taxonomy for the HTTP API.
//!
//! Every failure a client can observe maps to one of these variants, and each
//! variant maps to a fixed status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Result type for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// The detail is logged, never returned to the client.
    #[error("Model or scaler not loaded. Please check server logs.")]
    ServiceUnavailable(String),

    #[error("Prediction failed: {0}")]
    Inference(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_) | ApiError::InvalidField { .. } | ApiError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::ServiceUnavailable(_) | ApiError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Name of the offending input field, for client errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            ApiError::MissingField(field) | ApiError::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Strip internal detail from inference errors unless exposure is enabled.
    pub fn redact(self, expose_details: bool) -> Self {
        match self {
            ApiError::Inference(_) if !expose_details => {
                ApiError::Inference("internal error".to_string())
            }
            other => other,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            field: self.field().map(str::to_string),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
