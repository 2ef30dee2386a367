//! In-process transport: calls an engine in the same process directly.

use async_trait::async_trait;

use super::transport::Transport;
use crate::engine::QueueEngine;
use crate::error::Result;
use crate::model::{Enqueued, NewTask, PositionReport, Released};

#[derive(Clone)]
pub struct LocalTransport {
    engine: QueueEngine,
}

impl LocalTransport {
    pub fn new(engine: QueueEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn enqueue(&self, task: &NewTask) -> Result<Enqueued> {
        self.engine.enqueue(task.clone()).await
    }

    async fn position(&self, name: &str) -> Result<PositionReport> {
        Ok(self.engine.position(name).await)
    }

    async fn release(&self, name: &str) -> Result<Released> {
        self.engine.release(name).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.engine.remove(name).await
    }
}
