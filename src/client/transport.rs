//! The request/response surface a turn needs from the queue.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Enqueued, NewTask, PositionReport, Released};

/// Calls a turn makes against the queue, wherever it lives.
///
/// Implementations report network trouble as `Error::Transport` so the turn
/// protocol can tell it apart from queue-level answers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn enqueue(&self, task: &NewTask) -> Result<Enqueued>;

    /// Position lookup. An absent task is `Ok` with position `-1`.
    async fn position(&self, name: &str) -> Result<PositionReport>;

    /// Identity-checked release of the head of the line.
    async fn release(&self, name: &str) -> Result<Released>;

    async fn remove(&self, name: &str) -> Result<()>;
}
