//! Route handlers. Each one is a thin translation between JSON and a single
//! engine call.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use chrono::Utc;

use super::AppState;
use super::error::ApiError;
use crate::model::api::{
    ClearResponse, EnqueueRequest, ListResponse, ReleaseRequest, RemoveResponse,
};
use crate::model::{Enqueued, Health, MetricsReport, NewTask, PositionReport, Released};

/// `POST /queue`
pub async fn join_queue(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Enqueued>, ApiError> {
    let request: EnqueueRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Task name is required"))?;

    let mut task = NewTask::new(name).priority(request.priority.unwrap_or(0));
    if let Some(metadata) = request.metadata {
        task = task.metadata(metadata);
    }

    Ok(Json(state.engine().enqueue(task).await?))
}

/// `GET /queue/{name}`
pub async fn check_position(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<PositionReport> {
    Json(state.engine().position(&name).await)
}

/// `POST /queue/next`
///
/// With a `{"name": ...}` body the release only succeeds for the task at the
/// head; an empty body releases whoever is there.
pub async fn next_in_queue(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Released>, ApiError> {
    let request: ReleaseRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ReleaseRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?
    };

    let released = match request.name {
        Some(name) => state.engine().release(&name).await?,
        None => state.engine().release_head().await,
    };
    Ok(Json(released))
}

/// `DELETE /queue/remove/{name}`
pub async fn remove_from_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RemoveResponse>, ApiError> {
    state.engine().remove(&name).await?;
    Ok(Json(RemoveResponse {
        message: "Task removed successfully".to_string(),
        task: name,
    }))
}

/// `GET /queue/list`
pub async fn list_queue(State(state): State<AppState>) -> Json<ListResponse> {
    let queue = state.engine().list().await;
    Json(ListResponse {
        total: queue.len(),
        queue,
    })
}

/// `POST /queue/clear`
pub async fn clear_queue(State(state): State<AppState>) -> Json<ClearResponse> {
    let tasks_removed = state.engine().clear().await;
    Json(ClearResponse {
        message: "Queue cleared successfully".to_string(),
        tasks_removed,
    })
}

/// `GET /metrics`
pub async fn get_metrics(State(state): State<AppState>) -> Result<Json<MetricsReport>, ApiError> {
    let metrics = state
        .engine()
        .metrics()
        .await
        .ok_or(ApiError::MetricsDisabled)?;
    Ok(Json(MetricsReport {
        metrics,
        timestamp: Utc::now(),
    }))
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(state.engine().health().await)
}
