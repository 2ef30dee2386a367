//! HTTP surface for the queue engine.
//!
//! # Endpoints
//!
//! - `POST /queue` - join the line (`{name, priority?, metadata?}`)
//! - `GET /queue/{name}` - position lookup; `-1` when not queued
//! - `POST /queue/next` - release the head (optionally identity-checked)
//! - `DELETE /queue/remove/{name}` - remove a task wherever it stands
//! - `GET /queue/list` - every queued task in rank order
//! - `POST /queue/clear` - drop every task
//! - `GET /metrics` - counters and recent history (403 when disabled)
//! - `GET /health` - liveness; never behind the API-key gate

use std::future::Future;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AuthConfig;
use crate::engine::QueueEngine;
use crate::error::Result;

pub mod auth;
pub mod error;
pub mod handlers;

/// Shared application state, passed to handlers via `State`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: QueueEngine,
    auth: AuthConfig,
}

impl AppState {
    pub fn new(engine: QueueEngine, auth: AuthConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner { engine, auth }),
        }
    }

    pub fn engine(&self) -> &QueueEngine {
        &self.inner.engine
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.inner.auth
    }
}

/// Builds the router with all endpoints.
pub fn build_router(state: AppState) -> axum::Router {
    let gated = axum::Router::new()
        .route("/queue", post(handlers::join_queue))
        .route("/queue/list", get(handlers::list_queue))
        .route("/queue/next", post(handlers::next_in_queue))
        .route("/queue/clear", post(handlers::clear_queue))
        .route("/queue/remove/{name}", delete(handlers::remove_from_queue))
        .route("/queue/{name}", get(handlers::check_position))
        .route("/metrics", get(handlers::get_metrics))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    axum::Router::new()
        .route("/health", get(handlers::health_check))
        .merge(gated)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "turnq server listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("turnq server stopped");
    Ok(())
}
