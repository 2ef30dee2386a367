//! Task types: the queued unit of coordination and its wire views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A task waiting for its turn. Owned exclusively by the queue engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Identity and idempotency key. Unique among queued tasks.
    pub name: String,

    /// Higher runs sooner. Ignored when priority ordering is disabled.
    pub priority: i64,

    /// Arrival sequence number. Monotonic per engine; breaks priority ties.
    pub seq: u64,

    /// Wall-clock arrival time, for views and wait-time accounting.
    pub added_at: DateTime<Utc>,

    /// Arbitrary client data. The engine doesn't interpret it.
    pub metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status reported for a task name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in line (including at the head).
    Queued,
    /// Completed or forcibly removed. Terminal.
    Released,
    /// Lookup result for a name that is not queued.
    NotFound,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Released => "released",
            TaskStatus::NotFound => "not_found",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Position reported for a task that is not in the queue.
pub const NOT_FOUND_POSITION: i64 = -1;

/// A queued task as seen from outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub name: String,
    pub position: usize,
    pub priority: i64,
    pub status: TaskStatus,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Answer to "where am I in line?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    /// 1-based rank, or [`NOT_FOUND_POSITION`].
    pub position: i64,
    pub status: TaskStatus,
    #[serde(default)]
    pub queue_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl PositionReport {
    pub fn not_found(queue_size: usize) -> Self {
        Self {
            position: NOT_FOUND_POSITION,
            status: TaskStatus::NotFound,
            queue_size,
            metadata: None,
        }
    }

    pub fn is_head(&self) -> bool {
        self.position == 1
    }

    pub fn is_not_found(&self) -> bool {
        self.position == NOT_FOUND_POSITION || self.status == TaskStatus::NotFound
    }
}

/// Result of an enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enqueued {
    pub position: usize,
    pub priority: i64,
    pub queue_size: usize,
    /// False when the name was already queued and this was a re-join.
    #[serde(default = "default_true")]
    pub created: bool,
}

fn default_true() -> bool {
    true
}

/// Result of releasing the head of the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Released {
    /// Name of the released task; `None` when the queue was empty.
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub remaining: usize,
}

impl Released {
    pub fn empty() -> Self {
        Self {
            next: None,
            metadata: None,
            remaining: 0,
        }
    }
}

/// Liveness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub queue_size: usize,
    pub max_queue_size: usize,
    pub persistence: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a task submission. The engine's public API for joining the line.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub(crate) name: String,
    pub(crate) priority: i64,
    pub(crate) metadata: serde_json::Value,
}

impl NewTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
