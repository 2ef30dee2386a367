//! Metrics snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of lifecycle events kept in the recent history.
pub const HISTORY_LIMIT: usize = 100;

/// How a task left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Failed,
    Cleared,
}

/// One entry in the bounded lifecycle history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task: String,
    pub status: Outcome,
    pub completed_at: DateTime<Utc>,
}

/// Aggregate counters plus recent history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub current_queue_size: usize,
    /// Snapshot writes that failed since startup.
    #[serde(default)]
    pub persistence_failures: u64,
    /// Mean time from enqueue to release, over completed tasks.
    #[serde(default)]
    pub avg_wait_ms: f64,
    #[serde(default)]
    pub task_history: Vec<HistoryEntry>,
}

/// Body of the metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub metrics: MetricsSnapshot,
    pub timestamp: DateTime<Utc>,
}
