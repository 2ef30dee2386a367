//! HTTP transport: talks to a turnq server with reqwest.
//!
//! Connection errors, timeouts, and 5xx responses become
//! `Error::Transport` (retryable). Queue-level status codes map back onto
//! the engine's error kinds.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use super::transport::Transport;
use crate::error::{Error, Result};
use crate::model::api::{
    ClearResponse, EnqueueRequest, ErrorBody, ListResponse, ReleaseRequest, RemoveResponse,
};
use crate::model::{
    Enqueued, Health, MetricsReport, MetricsSnapshot, NewTask, PositionReport, Released, TaskView,
};
use crate::server::auth::API_KEY_HEADER;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: Option<SecretString>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid server URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("server URL {base_url} cannot be a base")));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Every queued task, in rank order.
    pub async fn list(&self) -> Result<Vec<TaskView>> {
        let response: ListResponse = self
            .send(self.request(Method::GET, &["queue", "list"]))
            .await?;
        Ok(response.queue)
    }

    /// Drop every task. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let response: ClearResponse = self
            .send(self.request(Method::POST, &["queue", "clear"]))
            .await?;
        Ok(response.tasks_removed)
    }

    /// Release whoever holds the head, without an identity check.
    pub async fn release_head(&self) -> Result<Released> {
        self.send(self.request(Method::POST, &["queue", "next"])).await
    }

    /// Metrics snapshot, or `None` when the server has metrics disabled.
    pub async fn metrics(&self) -> Result<Option<MetricsSnapshot>> {
        let response = self
            .request(Method::GET, &["metrics"])
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        if response.status() == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        let report: MetricsReport = Self::decode(response).await?;
        Ok(Some(report.metrics))
    }

    pub async fn health(&self) -> Result<Health> {
        self.send(self.request(Method::GET, &["health"])).await
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.url(segments));
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key.expose_secret()),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| Error::Transport(format!("bad response body: {e}")));
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        Err(status_error(status, body))
    }
}

fn status_error(status: StatusCode, body: ErrorBody) -> Error {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Error::QueueFull {
            capacity: body.capacity.unwrap_or_default(),
        },
        StatusCode::NOT_FOUND => Error::NotFound(body.message),
        StatusCode::CONFLICT => Error::Conflict {
            name: String::new(),
            head: body.head,
        },
        StatusCode::UNAUTHORIZED => Error::Unauthorized,
        StatusCode::BAD_REQUEST => Error::InvalidTask(body.message),
        s if s.is_server_error() => Error::Transport(format!("server error {s}: {}", body.message)),
        s => Error::Other(format!("{} {}: {}", s.as_u16(), body.error, body.message)),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn enqueue(&self, task: &NewTask) -> Result<Enqueued> {
        let body = EnqueueRequest::from(task);
        self.send(self.request(Method::POST, &["queue"]).json(&body))
            .await
    }

    async fn position(&self, name: &str) -> Result<PositionReport> {
        self.send(self.request(Method::GET, &["queue", name])).await
    }

    async fn release(&self, name: &str) -> Result<Released> {
        let body = ReleaseRequest {
            name: Some(name.to_string()),
        };
        self.send(self.request(Method::POST, &["queue", "next"]).json(&body))
            .await
            .map_err(|e| match e {
                Error::Conflict { head, .. } => Error::Conflict {
                    name: name.to_string(),
                    head,
                },
                Error::NotFound(_) => Error::NotFound(name.to_string()),
                other => other,
            })
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let _: RemoveResponse = self
            .send(self.request(Method::DELETE, &["queue", "remove", name]))
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(name.to_string()),
                other => other,
            })?;
        Ok(())
    }
}
