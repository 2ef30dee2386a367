//! The ranked queue: ordering, position assignment, and structural edits.
//!
//! Pure data structure with no locking or I/O. [`super::QueueEngine`] wraps
//! it in the critical section and adds persistence and metrics.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::model::{NewTask, Task, TaskStatus, TaskView};
use crate::storage::{PersistedTask, QueueSnapshot};

/// Names that collide with the static `/queue/...` routes and so could
/// never be looked up by position over HTTP.
pub const RESERVED_NAMES: [&str; 3] = ["list", "next", "clear"];

/// What an insert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    /// New task placed at this position.
    Created(usize),
    /// Name was already queued; its position is unchanged.
    Existing(usize),
}

/// Pending tasks in rank order.
///
/// Rank order is `(-priority, seq)` when priority ordering is enabled and
/// plain arrival order otherwise. After every structural change the position
/// index is rebuilt from the sorted sequence, so `position(tasks[i]) == i + 1`
/// always holds.
#[derive(Debug, Clone)]
pub struct RankedQueue {
    tasks: Vec<Task>,
    positions: HashMap<String, usize>,
    next_seq: u64,
    capacity: usize,
    priority_enabled: bool,
}

impl RankedQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            tasks: Vec::new(),
            positions: HashMap::new(),
            next_seq: 0,
            capacity: config.max_queue_size,
            priority_enabled: config.priority_enabled,
        }
    }

    /// Rebuild a queue from a durable image.
    ///
    /// Tasks are taken in persisted rank order and given fresh arrival
    /// numbers in that order, so ties keep the order they had when saved.
    /// Duplicate names keep their first (best-ranked) occurrence and reserved
    /// names are dropped. The
    /// capacity bound is not applied to restored tasks.
    pub fn restore(config: &QueueConfig, snapshot: QueueSnapshot) -> Self {
        let mut queue = Self::new(config);
        for persisted in snapshot.into_ranked() {
            if persisted.name.is_empty()
                || RESERVED_NAMES.contains(&persisted.name.as_str())
                || queue.positions.contains_key(&persisted.name)
            {
                continue;
            }
            let seq = queue.bump_seq();
            queue.positions.insert(persisted.name.clone(), 0);
            queue.tasks.push(Task {
                name: persisted.name,
                priority: persisted.priority,
                seq,
                added_at: persisted.created_at,
                metadata: persisted.metadata,
            });
        }
        queue.rerank();
        queue
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Add a task, or report the position of the already-queued one.
    ///
    /// A re-join is checked before capacity, so a client retrying its own
    /// enqueue against a full queue still learns its position.
    pub fn insert(&mut self, new: NewTask, now: DateTime<Utc>) -> Result<Insert> {
        if new.name.trim().is_empty() {
            return Err(Error::InvalidTask("task name is required".to_string()));
        }
        if RESERVED_NAMES.contains(&new.name.as_str()) {
            return Err(Error::InvalidTask(format!(
                "task name {:?} is reserved",
                new.name
            )));
        }
        if let Some(position) = self.position(&new.name) {
            return Ok(Insert::Existing(position));
        }
        if self.tasks.len() >= self.capacity {
            return Err(Error::QueueFull {
                capacity: self.capacity,
            });
        }

        let seq = self.bump_seq();
        let name = new.name;
        self.tasks.push(Task {
            name: name.clone(),
            priority: new.priority,
            seq,
            added_at: now,
            metadata: new.metadata,
        });
        self.rerank();

        let position = self
            .position(&name)
            .ok_or_else(|| Error::Other(format!("task {name} missing after insert")))?;
        Ok(Insert::Created(position))
    }

    /// 1-based position of `name`, if queued.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.position(name).map(|p| &self.tasks[p - 1])
    }

    pub fn head(&self) -> Option<&Task> {
        self.tasks.first()
    }

    /// Take the task at rank 1.
    pub fn pop_head(&mut self) -> Option<Task> {
        if self.tasks.is_empty() {
            return None;
        }
        let task = self.tasks.remove(0);
        self.reindex();
        Some(task)
    }

    /// Take a task by name, wherever it is in line.
    pub fn remove(&mut self, name: &str) -> Option<Task> {
        let index = self.position(name)? - 1;
        let task = self.tasks.remove(index);
        self.reindex();
        Some(task)
    }

    /// Take every task, in rank order.
    pub fn clear(&mut self) -> Vec<Task> {
        self.positions.clear();
        std::mem::take(&mut self.tasks)
    }

    /// All tasks in rank order.
    pub fn views(&self) -> Vec<TaskView> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(i, t)| to_view(t, i + 1))
            .collect()
    }

    /// The durable image of the current order.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tasks: self
                .tasks
                .iter()
                .enumerate()
                .map(|(i, t)| PersistedTask {
                    name: t.name.clone(),
                    position: i + 1,
                    priority: t.priority,
                    created_at: t.added_at,
                    metadata: t.metadata.clone(),
                })
                .collect(),
        }
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn rerank(&mut self) {
        if self.priority_enabled {
            self.tasks.sort_by_key(|t| (Reverse(t.priority), t.seq));
        }
        self.reindex();
    }

    fn reindex(&mut self) {
        self.positions.clear();
        for (i, task) in self.tasks.iter().enumerate() {
            self.positions.insert(task.name.clone(), i + 1);
        }
    }
}

fn to_view(task: &Task, position: usize) -> TaskView {
    TaskView {
        name: task.name.clone(),
        position,
        priority: task.priority,
        status: TaskStatus::Queued,
        added_at: task.added_at,
        metadata: task.metadata.clone(),
    }
}
