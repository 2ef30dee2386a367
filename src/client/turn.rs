//! The turn-wait protocol: join the line, poll until first, run, release.
//!
//! A [`Turn`] walks `Joining -> Waiting -> Running -> Done`, ending in
//! `Failed` or `Evicted` when something goes wrong. Every exit path after a
//! successful join either releases the task or removes it from the queue;
//! a turn dropped mid-flight spawns a best-effort removal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Span, debug, info, warn};

use super::retry::{RetryConfig, retry_with_backoff};
use super::transport::Transport;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Enqueued, NewTask, Released};
use crate::telemetry::turn::{record_state_transition, start_turn_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Joining,
    Waiting,
    Running,
    Done,
    Failed,
    Evicted,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Joining => "joining",
            TurnState::Waiting => "waiting",
            TurnState::Running => "running",
            TurnState::Done => "done",
            TurnState::Failed => "failed",
            TurnState::Evicted => "evicted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Failed | TurnState::Evicted)
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Time between position polls while waiting.
    pub poll_interval: Duration,
    /// Ceiling on time spent waiting for the head of the line.
    pub wait_timeout: Duration,
    /// Backoff for the join call.
    pub retry: RetryConfig,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(3600),
            retry: RetryConfig::DEFAULT,
        }
    }
}

impl TurnConfig {
    /// Defaults with the wait ceiling taken from `TASK_TIMEOUT`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            wait_timeout: config.task_timeout,
            ..Self::default()
        }
    }
}

/// One task's pass through the queue.
pub struct Turn {
    transport: Arc<dyn Transport>,
    task: NewTask,
    config: TurnConfig,
    state: TurnState,
    joined_at: Option<Instant>,
    position: Option<i64>,
    span: Span,
    join_attempted: bool,
}

impl Turn {
    pub fn new(transport: Arc<dyn Transport>, task: NewTask, config: TurnConfig) -> Self {
        let span = start_turn_span(task.name(), task.priority);
        record_state_transition(&span, "new", TurnState::Joining.as_str());
        Self {
            transport,
            task,
            config,
            state: TurnState::Joining,
            joined_at: None,
            position: None,
            span,
            join_attempted: false,
        }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Last position seen while waiting.
    pub fn position(&self) -> Option<i64> {
        self.position
    }

    /// Enqueue, retrying transport failures with backoff.
    ///
    /// On exhaustion the task is removed best-effort in case one of the
    /// failed attempts actually landed. Queue-level rejections such as
    /// `QueueFull` come back without retry.
    pub async fn join(&mut self) -> Result<Enqueued> {
        if self.state != TurnState::Joining || self.join_attempted {
            return Err(Error::Other(format!(
                "turn for {} cannot join from state {}",
                self.name(),
                self.state
            )));
        }
        self.join_attempted = true;

        let transport = &self.transport;
        let task = &self.task;
        let result =
            retry_with_backoff(&self.config.retry, "enqueue", move || transport.enqueue(task))
                .await;

        match result {
            Ok(enqueued) => {
                self.joined_at = Some(Instant::now());
                self.position = Some(enqueued.position as i64);
                info!(
                    task = %self.name(),
                    position = enqueued.position,
                    created = enqueued.created,
                    "joined queue"
                );
                self.transition(TurnState::Waiting);
                Ok(enqueued)
            }
            Err(e) => {
                warn!(task = %self.name(), error = %e, "failed to join queue");
                if e.is_transient() {
                    self.remove_self().await;
                }
                self.transition(TurnState::Failed);
                Err(e)
            }
        }
    }

    /// Poll until this task reaches the head of the line.
    ///
    /// Poll failures are tolerated. A task that vanished from the queue ends
    /// the turn as `Evicted`; waiting past the ceiling removes it and fails
    /// with `Timeout`.
    pub async fn await_turn(&mut self) -> Result<()> {
        if self.state != TurnState::Waiting {
            return Err(Error::Other(format!(
                "turn for {} cannot wait from state {}",
                self.name(),
                self.state
            )));
        }
        let joined_at = *self.joined_at.get_or_insert_with(Instant::now);

        loop {
            match self.transport.position(self.task.name()).await {
                Ok(report) if report.is_not_found() => return Err(self.evicted()),
                Ok(report) if report.is_head() => {
                    self.position = Some(report.position);
                    self.transition(TurnState::Running);
                    return Ok(());
                }
                Ok(report) => {
                    self.position = Some(report.position);
                    debug!(
                        task = %self.name(),
                        position = report.position,
                        queue_size = report.queue_size,
                        "waiting for turn"
                    );
                }
                Err(Error::NotFound(_)) => return Err(self.evicted()),
                Err(e) => {
                    warn!(task = %self.name(), error = %e, "position poll failed");
                }
            }

            let waited = joined_at.elapsed();
            if waited >= self.config.wait_timeout {
                warn!(
                    task = %self.name(),
                    waited_ms = waited.as_millis() as u64,
                    "timed out waiting for turn"
                );
                self.remove_self().await;
                self.transition(TurnState::Failed);
                return Err(Error::Timeout {
                    name: self.name().to_string(),
                    waited,
                });
            }

            let remaining = self.config.wait_timeout - waited;
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
        }
    }

    /// Release the head of the line. One attempt; a failure is logged and
    /// returned but the turn is done either way.
    pub async fn release(&mut self) -> Result<Released> {
        if self.state != TurnState::Running {
            return Err(Error::Other(format!(
                "turn for {} cannot release from state {}",
                self.name(),
                self.state
            )));
        }

        let result = self.transport.release(self.task.name()).await;
        match &result {
            Ok(released) => info!(
                task = %self.name(),
                remaining = released.remaining,
                "released turn"
            ),
            Err(e) => warn!(task = %self.name(), error = %e, "release failed"),
        }
        self.transition(TurnState::Done);
        result
    }

    /// Give up the turn: remove the task best-effort and mark it failed.
    pub async fn abandon(&mut self) {
        if self.needs_cleanup() {
            self.remove_self().await;
        }
        if !self.state.is_terminal() {
            self.transition(TurnState::Failed);
        }
    }

    /// Acquire the turn, run `body` once, and release.
    ///
    /// A body error removes the task and comes back as `Error::Task`.
    pub async fn run<T, F, Fut>(mut self, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.join().await?;
        self.await_turn().await?;

        match body().await {
            Ok(value) => {
                let _ = self.release().await;
                Ok(value)
            }
            Err(e) => {
                warn!(task = %self.name(), error = %e, "task body failed");
                self.remove_self().await;
                self.transition(TurnState::Failed);
                Err(Error::Task(e))
            }
        }
    }

    fn needs_cleanup(&self) -> bool {
        match self.state {
            TurnState::Waiting | TurnState::Running => true,
            TurnState::Joining => self.join_attempted,
            _ => false,
        }
    }

    fn evicted(&mut self) -> Error {
        warn!(task = %self.name(), "task no longer in queue");
        self.transition(TurnState::Evicted);
        Error::Evicted(self.name().to_string())
    }

    async fn remove_self(&self) {
        match self.transport.remove(self.task.name()).await {
            Ok(()) => info!(task = %self.name(), "removed from queue"),
            Err(Error::NotFound(_)) => {}
            Err(e) => warn!(task = %self.name(), error = %e, "failed to remove task"),
        }
    }

    fn transition(&mut self, to: TurnState) {
        record_state_transition(&self.span, self.state.as_str(), to.as_str());
        self.state = to;
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        if !self.needs_cleanup() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(task = %self.name(), "no runtime to remove abandoned task");
            return;
        };
        let transport = Arc::clone(&self.transport);
        let name = self.task.name().to_string();
        handle.spawn(async move {
            if let Err(e) = transport.remove(&name).await {
                debug!(task = %name, error = %e, "cleanup of abandoned turn failed");
            }
        });
    }
}
