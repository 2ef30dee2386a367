//! Lifecycle events emitted by the engine on every structural change.
//!
//! The metrics recorder consumes these to keep its counters and history;
//! the durable store receives one metric row per event.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    TaskAdded {
        name: String,
        priority: i64,
    },
    /// The head of the line finished its turn.
    TaskCompleted {
        name: String,
        waited_ms: u64,
    },
    /// A task was removed before finishing (timeout, error, admin).
    TaskFailed {
        name: String,
    },
    QueueCleared {
        names: Vec<String>,
    },
}

impl LifecycleEvent {
    /// Stable kind label, used as the persisted metric type.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::TaskAdded { .. } => "task_added",
            LifecycleEvent::TaskCompleted { .. } => "task_completed",
            LifecycleEvent::TaskFailed { .. } => "task_failed",
            LifecycleEvent::QueueCleared { .. } => "queue_cleared",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}
