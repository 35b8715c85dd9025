//! Request-boundary errors.
//!
//! Every failure leaves the server as `{"error": "..."}`. Internal details
//! are logged, never returned.

use crate::backend::BackendError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned while no backend is available.
pub const BACKEND_UNAVAILABLE_MESSAGE: &str = "LLM not initialized";

/// Message returned for any other server-side fault.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Error envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend failed to initialize at startup
    #[error("LLM not initialized")]
    BackendUnavailable,

    /// Bad client input on the file endpoints
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Parsing failures, backend transport failures, anything unexpected
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BackendUnavailable | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::BackendUnavailable => BACKEND_UNAVAILABLE_MESSAGE.to_string(),
            Self::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            Self::InvalidInput(msg) | Self::NotFound(msg) => msg.clone(),
        }
    }
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Error processing request");
            }
            Self::BackendUnavailable => {
                tracing::error!("LLM not initialized. Cannot process request.");
            }
            _ => {
                tracing::debug!(error = %self, "Request rejected");
            }
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}
