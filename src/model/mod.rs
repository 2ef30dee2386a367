//! Core data model.
//!
//! A task is a named claim on a turn. It has identity (its name), a priority,
//! an arrival order, and an opaque metadata blob. Its position in line is
//! always derived from rank order, never stored on the task.

pub mod api;
pub mod metrics;
pub mod task;

pub use metrics::{HISTORY_LIMIT, HistoryEntry, MetricsReport, MetricsSnapshot, Outcome};
pub use task::{
    Enqueued, Health, NOT_FOUND_POSITION, NewTask, PositionReport, Released, Task, TaskStatus,
    TaskView,
};
