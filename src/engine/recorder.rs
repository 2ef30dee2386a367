//! Metrics recorder: lifecycle counters and a bounded event history.
//!
//! Observes the engine, never drives it. Each recorded event is also handed
//! to the durable store's metric log on a spawned task so a slow or broken
//! store cannot hold up the queue operation that produced it.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use opentelemetry::KeyValue;
use tracing::warn;

use crate::event::LifecycleEvent;
use crate::model::{HISTORY_LIMIT, HistoryEntry, MetricsSnapshot, Outcome};
use crate::storage::DurableStore;
use crate::telemetry::metrics;

pub struct MetricsRecorder {
    enabled: bool,
    total_tasks: u64,
    completed_tasks: u64,
    failed_tasks: u64,
    current_queue_size: usize,
    persistence_failures: u64,
    total_wait_ms: u64,
    history: VecDeque<HistoryEntry>,
    store: Option<Arc<dyn DurableStore>>,
}

impl MetricsRecorder {
    pub fn new(enabled: bool, store: Option<Arc<dyn DurableStore>>) -> Self {
        Self {
            enabled,
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            current_queue_size: 0,
            persistence_failures: 0,
            total_wait_ms: 0,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
            store,
        }
    }

    /// Sync the live queue length without recording an event, e.g. after
    /// restoring from the durable store.
    pub fn set_queue_size(&mut self, size: usize) {
        if self.enabled {
            self.current_queue_size = size;
        }
    }

    /// Apply one lifecycle event. `queue_size` is the length after the event.
    pub fn record(&mut self, event: &LifecycleEvent, queue_size: usize) {
        if !self.enabled {
            return;
        }

        match event {
            LifecycleEvent::TaskAdded { .. } => {
                self.total_tasks += 1;
            }
            LifecycleEvent::TaskCompleted { name, waited_ms } => {
                self.completed_tasks += 1;
                self.total_wait_ms = self.total_wait_ms.saturating_add(*waited_ms);
                self.push_history(name, Outcome::Completed);
            }
            LifecycleEvent::TaskFailed { name } => {
                self.failed_tasks += 1;
                self.push_history(name, Outcome::Failed);
            }
            LifecycleEvent::QueueCleared { names } => {
                self.failed_tasks += names.len() as u64;
                for name in names {
                    self.push_history(name, Outcome::Cleared);
                }
            }
        }
        self.current_queue_size = queue_size;

        self.persist(event.kind(), queue_size as f64);
    }

    /// Count a failed snapshot write.
    pub fn record_persistence_failure(&mut self) {
        if self.enabled {
            self.persistence_failures += 1;
        }
    }

    /// Current counters and history, or `None` when disabled.
    pub fn snapshot(&self) -> Option<MetricsSnapshot> {
        if !self.enabled {
            return None;
        }
        let avg_wait_ms = if self.completed_tasks == 0 {
            0.0
        } else {
            self.total_wait_ms as f64 / self.completed_tasks as f64
        };
        Some(MetricsSnapshot {
            total_tasks: self.total_tasks,
            completed_tasks: self.completed_tasks,
            failed_tasks: self.failed_tasks,
            current_queue_size: self.current_queue_size,
            persistence_failures: self.persistence_failures,
            avg_wait_ms,
            task_history: self.history.iter().cloned().collect(),
        })
    }

    fn push_history(&mut self, name: &str, status: Outcome) {
        while self.history.len() >= HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            task: name.to_string(),
            status,
            completed_at: Utc::now(),
        });
    }

    fn persist(&self, kind: &'static str, value: f64) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            if let Err(e) = store.append_metric(kind, value).await {
                warn!(metric = kind, error = %e, "failed to persist metric");
                metrics::persistence_failures().add(1, &[KeyValue::new("operation", "metric")]);
            }
        });
    }
}
