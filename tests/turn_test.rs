//! Turn-wait protocol tests. Time is paused, so poll intervals and backoff
//! delays elapse instantly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use turnq::client::{LocalTransport, RetryConfig, Transport, Turn, TurnConfig, TurnState};
use turnq::config::{Config, QueueConfig};
use turnq::engine::QueueEngine;
use turnq::error::{Error, Result};
use turnq::model::{Enqueued, NewTask, PositionReport, Released};

/// Wraps an in-process engine and injects transport failures.
struct FlakyTransport {
    inner: LocalTransport,
    enqueue_failures: AtomicU32,
    poll_failures: AtomicU32,
    enqueue_calls: AtomicU32,
    removed: Mutex<Vec<String>>,
}

impl FlakyTransport {
    fn new(engine: QueueEngine) -> Self {
        Self {
            inner: LocalTransport::new(engine),
            enqueue_failures: AtomicU32::new(0),
            poll_failures: AtomicU32::new(0),
            enqueue_calls: AtomicU32::new(0),
            removed: Mutex::new(Vec::new()),
        }
    }

    fn failing_enqueues(self, n: u32) -> Self {
        self.enqueue_failures.store(n, Ordering::SeqCst);
        self
    }

    fn failing_polls(self, n: u32) -> Self {
        self.poll_failures.store(n, Ordering::SeqCst);
        self
    }

    fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn enqueue(&self, task: &NewTask) -> Result<Enqueued> {
        self.enqueue_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.enqueue_failures) {
            return Err(Error::Transport("connection refused".to_string()));
        }
        self.inner.enqueue(task).await
    }

    async fn position(&self, name: &str) -> Result<PositionReport> {
        if Self::take_failure(&self.poll_failures) {
            return Err(Error::Transport("connection reset".to_string()));
        }
        self.inner.position(name).await
    }

    async fn release(&self, name: &str) -> Result<Released> {
        self.inner.release(name).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.removed.lock().unwrap().push(name.to_string());
        self.inner.remove(name).await
    }
}

fn engine() -> QueueEngine {
    QueueEngine::in_memory(QueueConfig::default())
}

fn fast_config() -> TurnConfig {
    TurnConfig {
        poll_interval: Duration::from_secs(5),
        wait_timeout: Duration::from_secs(3600),
        retry: RetryConfig::DEFAULT,
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn run_executes_body_and_releases() {
    let engine = engine();
    let transport = Arc::new(LocalTransport::new(engine.clone()));

    let turn = Turn::new(transport, NewTask::new("deploy"), fast_config());
    let value = turn.run(|| async { Ok(42) }).await.unwrap();

    assert_eq!(value, 42);
    assert!(engine.is_empty().await);
    assert_eq!(engine.metrics().await.unwrap().completed_tasks, 1);
}

#[tokio::test(start_paused = true)]
async fn step_by_step_walks_every_state() {
    let engine = engine();
    let transport = Arc::new(LocalTransport::new(engine.clone()));
    let mut turn = Turn::new(transport, NewTask::new("build").priority(3), fast_config());
    assert_eq!(turn.state(), TurnState::Joining);

    let enqueued = turn.join().await.unwrap();
    assert_eq!(enqueued.position, 1);
    assert_eq!(turn.state(), TurnState::Waiting);

    turn.await_turn().await.unwrap();
    assert_eq!(turn.state(), TurnState::Running);
    assert_eq!(turn.position(), Some(1));

    let released = turn.release().await.unwrap();
    assert_eq!(released.next.as_deref(), Some("build"));
    assert_eq!(turn.state(), TurnState::Done);

    assert!(turn.join().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn waits_until_holder_releases() {
    let engine = engine();
    engine.enqueue(NewTask::new("holder")).await.unwrap();
    let transport = Arc::new(LocalTransport::new(engine.clone()));

    let turn = Turn::new(transport, NewTask::new("waiter"), fast_config());
    let handle = tokio::spawn(turn.run(|| async { Ok("ran") }));

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert!(!handle.is_finished());
    assert_eq!(engine.position("waiter").await.position, 2);

    engine.release("holder").await.unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), "ran");
    assert!(engine.is_empty().await);
}

// ---------------------------------------------------------------------------
// Waiting failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn timeout_removes_task_without_overshooting() {
    let engine = engine();
    engine.enqueue(NewTask::new("holder")).await.unwrap();
    let transport = Arc::new(FlakyTransport::new(engine.clone()));

    let config = TurnConfig {
        poll_interval: Duration::from_secs(5),
        wait_timeout: Duration::from_secs(1),
        ..fast_config()
    };
    let started = tokio::time::Instant::now();
    let turn = Turn::new(transport.clone(), NewTask::new("impatient"), config);
    let err = turn.run(|| async { Ok(()) }).await.unwrap_err();

    match err {
        Error::Timeout { name, waited } => {
            assert_eq!(name, "impatient");
            assert!(waited >= Duration::from_secs(1));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(transport.removed(), ["impatient"]);
    assert!(engine.position("impatient").await.is_not_found());
    assert_eq!(engine.position("holder").await.position, 1);
}

#[tokio::test(start_paused = true)]
async fn task_timeout_sets_the_wait_ceiling() {
    let config = Config::from_lookup(|name| (name == "TASK_TIMEOUT").then(|| "2".to_string()))
        .unwrap();
    let turn_config = TurnConfig::from_config(&config);
    assert_eq!(turn_config.wait_timeout, Duration::from_secs(2));
    assert_eq!(turn_config.poll_interval, TurnConfig::default().poll_interval);

    let engine = engine();
    engine.enqueue(NewTask::new("holder")).await.unwrap();
    let transport = Arc::new(LocalTransport::new(engine.clone()));

    let started = tokio::time::Instant::now();
    let turn = Turn::new(transport, NewTask::new("bounded"), turn_config);
    let err = turn.run(|| async { Ok(()) }).await.unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(engine.position("bounded").await.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn removal_while_waiting_is_eviction() {
    let engine = engine();
    engine.enqueue(NewTask::new("holder")).await.unwrap();
    let transport = Arc::new(LocalTransport::new(engine.clone()));

    let turn = Turn::new(transport, NewTask::new("victim"), fast_config());
    let handle = tokio::spawn(turn.run(|| async { Ok(()) }));

    tokio::time::sleep(Duration::from_secs(1)).await;
    engine.remove("victim").await.unwrap();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Evicted(name) if name == "victim"));
}

#[tokio::test(start_paused = true)]
async fn poll_failures_are_tolerated() {
    let engine = engine();
    let transport = Arc::new(FlakyTransport::new(engine.clone()).failing_polls(2));

    let turn = Turn::new(transport.clone(), NewTask::new("steady"), fast_config());
    turn.run(|| async { Ok(()) }).await.unwrap();

    assert!(transport.removed().is_empty());
    assert!(engine.is_empty().await);
}

// ---------------------------------------------------------------------------
// Join failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn join_retries_transient_failures() {
    let engine = engine();
    let transport = Arc::new(FlakyTransport::new(engine.clone()).failing_enqueues(2));

    let mut turn = Turn::new(transport.clone(), NewTask::new("retrying"), fast_config());
    turn.join().await.unwrap();

    assert_eq!(transport.enqueue_calls.load(Ordering::SeqCst), 3);
    assert_eq!(engine.position("retrying").await.position, 1);
    turn.abandon().await;
    assert_eq!(turn.state(), TurnState::Failed);
    assert!(engine.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn join_exhaustion_fails_and_cleans_up() {
    let engine = engine();
    let transport = Arc::new(FlakyTransport::new(engine.clone()).failing_enqueues(u32::MAX));

    let mut turn = Turn::new(transport.clone(), NewTask::new("unlucky"), fast_config());
    let err = turn.join().await.unwrap_err();

    assert!(err.is_transient());
    assert_eq!(turn.state(), TurnState::Failed);
    assert_eq!(transport.enqueue_calls.load(Ordering::SeqCst), 4);
    assert_eq!(transport.removed(), ["unlucky"]);
}

#[tokio::test(start_paused = true)]
async fn queue_full_is_not_retried() {
    let engine = QueueEngine::in_memory(QueueConfig {
        max_queue_size: 1,
        ..QueueConfig::default()
    });
    engine.enqueue(NewTask::new("holder")).await.unwrap();
    let transport = Arc::new(FlakyTransport::new(engine.clone()));

    let turn = Turn::new(transport.clone(), NewTask::new("late"), fast_config());
    let err = turn.run(|| async { Ok(()) }).await.unwrap_err();

    assert!(matches!(err, Error::QueueFull { capacity: 1 }));
    assert_eq!(transport.enqueue_calls.load(Ordering::SeqCst), 1);
    assert!(transport.removed().is_empty());
}

// ---------------------------------------------------------------------------
// Running failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn body_failure_removes_task() {
    let engine = engine();
    let transport = Arc::new(FlakyTransport::new(engine.clone()));

    let turn = Turn::new(transport.clone(), NewTask::new("broken"), fast_config());
    let err = turn
        .run(|| async { Err::<(), _>(anyhow::anyhow!("exit status 1")) })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Task(_)));
    assert_eq!(transport.removed(), ["broken"]);
    assert!(engine.is_empty().await);

    let metrics = engine.metrics().await.unwrap();
    assert_eq!(metrics.failed_tasks, 1);
    assert_eq!(metrics.completed_tasks, 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_turn_leaves_the_line() {
    let engine = engine();
    engine.enqueue(NewTask::new("holder")).await.unwrap();
    let transport = Arc::new(LocalTransport::new(engine.clone()));

    let mut turn = Turn::new(transport, NewTask::new("quitter"), fast_config());
    turn.join().await.unwrap();
    assert_eq!(engine.len().await, 2);

    drop(turn);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(engine.position("quitter").await.is_not_found());
    assert_eq!(engine.len().await, 1);
}
