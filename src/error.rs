//! Error types for turnq.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("queue full: capacity {capacity} reached")]
    QueueFull { capacity: usize },

    #[error("task not found: {0}")]
    NotFound(String),

    /// An identity-checked release named a task that is not at the head.
    #[error("task {name} is not at the head of the queue (head: {head:?})")]
    Conflict { name: String, head: Option<String> },

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("unauthorized: valid API key required")]
    Unauthorized,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("task {name} timed out after {waited:?} waiting for its turn")]
    Timeout { name: String, waited: Duration },

    #[error("task {0} was removed from the queue while waiting")]
    Evicted(String),

    #[error("task body failed: {0}")]
    Task(anyhow::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the turn protocol should retry the call that produced this.
    ///
    /// Only transport-level failures qualify; queue-level outcomes such as
    /// `QueueFull` or `NotFound` go straight back to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
