//! Durable store contract.
//!
//! The store mirrors the engine's queue so a restart can recover it; it never
//! decides anything. Snapshot saves replace the whole image atomically.
//! Metric appends are best-effort and must not hold up queue operations.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One queued task as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTask {
    pub name: String,
    /// 1-based rank at save time. Load order follows this field.
    pub position: usize,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// The complete durable image of the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub tasks: Vec<PersistedTask>,
}

impl QueueSnapshot {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks sorted by their persisted rank.
    pub fn into_ranked(mut self) -> Vec<PersistedTask> {
        self.tasks.sort_by_key(|t| t.position);
        self.tasks
    }
}

/// One row of the append-only metric log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub kind: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Replace the durable queue image. A crash mid-write must leave either
    /// the old or the new image, never a mix.
    async fn save_snapshot(&self, snapshot: &QueueSnapshot) -> Result<()>;

    /// Read the last saved image, in rank order.
    async fn load_snapshot(&self) -> Result<QueueSnapshot>;

    /// Append one lifecycle metric.
    async fn append_metric(&self, kind: &str, value: f64) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-process store
// ---------------------------------------------------------------------------

/// Store that keeps its image in memory. Survives engine restarts within a
/// process, which is what tests and embedded single-process use need.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

#[derive(Debug, Default)]
struct MemoryInner {
    snapshot: QueueSnapshot,
    metrics: Vec<MetricRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing image, as if a previous process had saved it.
    pub fn with_snapshot(snapshot: QueueSnapshot) -> Self {
        let store = Self::default();
        store.lock().snapshot = snapshot;
        store
    }

    /// Make every subsequent write fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The current durable image.
    pub fn snapshot(&self) -> QueueSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn metrics(&self) -> Vec<MetricRecord> {
        self.lock().metrics.clone()
    }

    /// Number of successful snapshot saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::Other("memory store is failing writes".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn save_snapshot(&self, snapshot: &QueueSnapshot) -> Result<()> {
        self.check_writable()?;
        self.lock().snapshot = snapshot.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<QueueSnapshot> {
        Ok(self.lock().snapshot.clone())
    }

    async fn append_metric(&self, kind: &str, value: f64) -> Result<()> {
        self.check_writable()?;
        self.lock().metrics.push(MetricRecord {
            kind: kind.to_string(),
            value,
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}
