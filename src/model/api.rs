//! Request and response bodies shared by the HTTP server and client.

use serde::{Deserialize, Serialize};

use super::task::{NewTask, TaskView};

/// Body of `POST /queue`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl From<&NewTask> for EnqueueRequest {
    fn from(task: &NewTask) -> Self {
        Self {
            name: Some(task.name.clone()),
            priority: Some(task.priority),
            metadata: (!task.metadata.is_null()).then(|| task.metadata.clone()),
        }
    }
}

/// Optional body of `POST /queue/next`. A name turns on the head check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub queue: Vec<TaskView>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub message: String,
    pub task: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    pub tasks_removed: usize,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
}
