//! API-key gate.
//!
//! Applied to every route except `/health`. When the gate is disabled in
//! configuration, requests pass straight through.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use super::AppState;
use super::error::ApiError;

/// Header carrying the pre-shared key.
pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = state.auth();
    if !auth.enabled {
        return Ok(next.run(request).await);
    }

    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match key {
        Some(key) if auth.api_keys.contains(key) => {
            debug!(path = %request.uri().path(), "authenticated request");
            Ok(next.run(request).await)
        }
        _ => {
            warn!(path = %request.uri().path(), "unauthorized access attempt");
            Err(ApiError::Unauthorized)
        }
    }
}
