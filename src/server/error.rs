//! HTTP error responses.
//!
//! Maps engine error kinds to status codes: queue full is 429, not found is
//! 404, a release by a task that isn't at the head is 409, and anything
//! unexpected is 500.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::error::Error;
use crate::model::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Engine(#[from] Error),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("metrics disabled")]
    MetricsDisabled,

    #[error("valid API key required")]
    Unauthorized,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        let body = |error: &str, message: String| ErrorBody {
            error: error.to_string(),
            message,
            ..ErrorBody::default()
        };

        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, body("Bad Request", msg.clone()))
            }
            ApiError::MetricsDisabled => (
                StatusCode::FORBIDDEN,
                body("Metrics disabled", "metrics are disabled on this server".to_string()),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                body("Unauthorized", "Valid API key required".to_string()),
            ),
            ApiError::Engine(e) => match e {
                Error::QueueFull { capacity } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    ErrorBody {
                        capacity: Some(*capacity),
                        ..body("Queue Full", "Maximum queue size reached".to_string())
                    },
                ),
                Error::NotFound(_) => (
                    StatusCode::NOT_FOUND,
                    body("Not Found", "Task not in queue".to_string()),
                ),
                Error::Conflict { head, .. } => (
                    StatusCode::CONFLICT,
                    ErrorBody {
                        head: head.clone(),
                        ..body("Conflict", e.to_string())
                    },
                ),
                Error::InvalidTask(msg) => {
                    (StatusCode::BAD_REQUEST, body("Bad Request", msg.clone()))
                }
                Error::Unauthorized => (
                    StatusCode::UNAUTHORIZED,
                    body("Unauthorized", "Valid API key required".to_string()),
                ),
                other => {
                    error!(error = %other, "request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        body("Internal Server Error", other.to_string()),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}
