//! Queue engine: the single authoritative owner of the turn queue.
//!
//! Every structural operation runs under one write lock, and the snapshot
//! write to the durable store happens inside that same critical section, so
//! callers never observe a half-updated position table and never get a
//! success back before the snapshot attempt was made. A failed snapshot is
//! logged and counted; the in-memory queue stays authoritative.

use std::sync::Arc;

use chrono::Utc;
use opentelemetry::KeyValue;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::event::LifecycleEvent;
use crate::model::{
    Enqueued, Health, MetricsSnapshot, NewTask, PositionReport, Released, TaskStatus, TaskView,
};
use crate::storage::{DurableStore, MemoryStore};
use crate::telemetry::metrics;

use super::queue::{Insert, RankedQueue};
use super::recorder::MetricsRecorder;

/// Cloneable handle to the engine. All clones share one queue.
#[derive(Clone)]
pub struct QueueEngine {
    state: Arc<RwLock<EngineState>>,
    store: Arc<dyn DurableStore>,
    config: QueueConfig,
}

struct EngineState {
    queue: RankedQueue,
    recorder: MetricsRecorder,
}

impl QueueEngine {
    /// Create an engine with an empty queue, mirroring into `store`.
    pub fn new(config: QueueConfig, store: Arc<dyn DurableStore>) -> Self {
        let queue = RankedQueue::new(&config);
        Self::with_queue(config, store, queue)
    }

    /// Create an engine backed by a fresh [`MemoryStore`].
    pub fn in_memory(config: QueueConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    /// Create an engine whose initial queue is the store's last snapshot.
    ///
    /// A failed load is logged and the engine starts empty.
    pub async fn open(config: QueueConfig, store: Arc<dyn DurableStore>) -> Self {
        let queue = match store.load_snapshot().await {
            Ok(snapshot) => {
                let queue = RankedQueue::restore(&config, snapshot);
                if !queue.is_empty() {
                    info!(tasks = queue.len(), "loaded queue from durable store");
                }
                queue
            }
            Err(e) => {
                error!(error = %e, "failed to load queue state, starting empty");
                metrics::persistence_failures().add(1, &[KeyValue::new("operation", "load")]);
                RankedQueue::new(&config)
            }
        };
        Self::with_queue(config, store, queue)
    }

    fn with_queue(config: QueueConfig, store: Arc<dyn DurableStore>, queue: RankedQueue) -> Self {
        let mut recorder = MetricsRecorder::new(config.metrics_enabled, Some(Arc::clone(&store)));
        recorder.set_queue_size(queue.len());
        Self {
            state: Arc::new(RwLock::new(EngineState { queue, recorder })),
            store,
            config,
        }
    }

    /// Join the line. Re-joining with a queued name returns its current
    /// position and changes nothing.
    pub async fn enqueue(&self, new: NewTask) -> Result<Enqueued> {
        let mut state = self.state.write().await;

        let name = new.name.clone();
        let insert = match state.queue.insert(new, Utc::now()) {
            Ok(insert) => insert,
            Err(e) => {
                if let Error::QueueFull { .. } = e {
                    warn!(task = %name, "queue full, rejecting task");
                    metrics::tasks_enqueued().add(1, &[KeyValue::new("result", "queue_full")]);
                }
                return Err(e);
            }
        };

        let queue_size = state.queue.len();
        let priority = state.queue.get(&name).map(|t| t.priority).unwrap_or_default();

        match insert {
            Insert::Existing(position) => {
                debug!(task = %name, position, "task already queued");
                metrics::tasks_enqueued().add(1, &[KeyValue::new("result", "rejoined")]);
                Ok(Enqueued {
                    position,
                    priority,
                    queue_size,
                    created: false,
                })
            }
            Insert::Created(position) => {
                state.recorder.record(
                    &LifecycleEvent::TaskAdded {
                        name: name.clone(),
                        priority,
                    },
                    queue_size,
                );
                self.persist(&mut state).await;
                metrics::tasks_enqueued().add(1, &[KeyValue::new("result", "created")]);
                info!(task = %name, position, priority, queue_size, "task added");
                Ok(Enqueued {
                    position,
                    priority,
                    queue_size,
                    created: true,
                })
            }
        }
    }

    /// Where `name` stands. Absence is a normal answer, not an error.
    pub async fn position(&self, name: &str) -> PositionReport {
        let state = self.state.read().await;
        let queue_size = state.queue.len();
        match state.queue.get(name) {
            Some(task) => PositionReport {
                position: state.queue.position(name).unwrap_or_default() as i64,
                status: TaskStatus::Queued,
                queue_size,
                metadata: Some(task.metadata.clone()),
            },
            None => PositionReport::not_found(queue_size),
        }
    }

    /// Release whichever task is at the head, without checking who asks.
    ///
    /// Kept for administrators and callers that don't identify themselves;
    /// the turn protocol uses [`QueueEngine::release`].
    pub async fn release_head(&self) -> Released {
        let mut state = self.state.write().await;
        self.release_head_locked(&mut state).await
    }

    /// Release the head only if it is `name`.
    ///
    /// Fails with `NotFound` when `name` is not queued and `Conflict` when it
    /// is queued behind someone else.
    pub async fn release(&self, name: &str) -> Result<Released> {
        let mut state = self.state.write().await;
        let head = state.queue.head().map(|t| t.name.clone());
        if head.as_deref() != Some(name) {
            if state.queue.position(name).is_none() {
                return Err(Error::NotFound(name.to_string()));
            }
            warn!(task = %name, head = ?head, "release requested by task not at head");
            return Err(Error::Conflict {
                name: name.to_string(),
                head,
            });
        }
        Ok(self.release_head_locked(&mut state).await)
    }

    async fn release_head_locked(&self, state: &mut EngineState) -> Released {
        let Some(task) = state.queue.pop_head() else {
            return Released::empty();
        };
        let remaining = state.queue.len();
        let waited_ms = (Utc::now() - task.added_at).num_milliseconds().max(0) as u64;

        state.recorder.record(
            &LifecycleEvent::TaskCompleted {
                name: task.name.clone(),
                waited_ms,
            },
            remaining,
        );
        self.persist(state).await;

        metrics::tasks_released().add(1, &[]);
        metrics::wait_duration_ms().record(waited_ms as f64, &[]);
        info!(task = %task.name, remaining, waited_ms, "task completed");

        Released {
            next: Some(task.name),
            metadata: Some(task.metadata),
            remaining,
        }
    }

    /// Take `name` out of line wherever it stands (timeout, error, admin).
    pub async fn remove(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let task = state
            .queue
            .remove(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let queue_size = state.queue.len();

        state.recorder.record(
            &LifecycleEvent::TaskFailed {
                name: task.name.clone(),
            },
            queue_size,
        );
        self.persist(&mut state).await;

        metrics::tasks_removed().add(1, &[KeyValue::new("reason", "removed")]);
        info!(task = %task.name, queue_size, "task removed");
        Ok(())
    }

    /// Every queued task in rank order.
    pub async fn list(&self) -> Vec<TaskView> {
        self.state.read().await.queue.views()
    }

    /// Drop every task. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.write().await;
        let removed = state.queue.clear();
        let count = removed.len();

        state.recorder.record(
            &LifecycleEvent::QueueCleared {
                names: removed.into_iter().map(|t| t.name).collect(),
            },
            0,
        );
        self.persist(&mut state).await;

        metrics::tasks_removed().add(count as u64, &[KeyValue::new("reason", "cleared")]);
        warn!(removed = count, "queue cleared");
        count
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.queue.is_empty()
    }

    /// Metrics snapshot, or `None` when metrics are disabled.
    pub async fn metrics(&self) -> Option<MetricsSnapshot> {
        self.state.read().await.recorder.snapshot()
    }

    pub async fn health(&self) -> Health {
        let state = self.state.read().await;
        Health {
            status: "healthy".to_string(),
            queue_size: state.queue.len(),
            max_queue_size: self.config.max_queue_size,
            persistence: "enabled".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Write the current image to the store. Called with the write lock held.
    async fn persist(&self, state: &mut EngineState) {
        let snapshot = state.queue.snapshot();
        if let Err(e) = self.store.save_snapshot(&snapshot).await {
            error!(error = %e, tasks = snapshot.len(), "failed to save queue state");
            metrics::persistence_failures().add(1, &[KeyValue::new("operation", "snapshot")]);
            state.recorder.record_persistence_failure();
        }
    }
}
