//! End-to-end: HttpTransport against a live server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use turnq::client::{HttpTransport, RetryConfig, Transport, Turn, TurnConfig};
use turnq::config::secrets::{ApiKeys, SecretString};
use turnq::config::{AuthConfig, QueueConfig};
use turnq::engine::QueueEngine;
use turnq::error::Error;
use turnq::model::NewTask;
use turnq::server::{self, AppState};

struct TestServer {
    url: String,
    engine: QueueEngine,
    _shutdown: oneshot::Sender<()>,
}

async fn start_server(config: QueueConfig, auth: AuthConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let engine = QueueEngine::in_memory(config);
    let state = AppState::new(engine.clone(), auth);

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server::serve(listener, state, async {
        rx.await.ok();
    }));

    TestServer {
        url,
        engine,
        _shutdown: tx,
    }
}

#[tokio::test]
async fn client_round_trip() {
    let server = start_server(QueueConfig::default(), AuthConfig::default()).await;
    let client = HttpTransport::new(&server.url, None).unwrap();

    let first = client.enqueue(&NewTask::new("a")).await.unwrap();
    assert_eq!(first.position, 1);
    assert!(first.created);
    client.enqueue(&NewTask::new("b").priority(5)).await.unwrap();

    assert_eq!(client.position("a").await.unwrap().position, 2);
    assert!(client.position("ghost").await.unwrap().is_not_found());

    let listed: Vec<_> = client.list().await.unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(listed, ["b", "a"]);

    match client.release("a").await {
        Err(Error::Conflict { name, head }) => {
            assert_eq!(name, "a");
            assert_eq!(head.as_deref(), Some("b"));
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
    let released = client.release("b").await.unwrap();
    assert_eq!(released.next.as_deref(), Some("b"));

    assert!(matches!(
        client.remove("ghost").await,
        Err(Error::NotFound(name)) if name == "ghost"
    ));
    client.remove("a").await.unwrap();
    assert!(server.engine.is_empty().await);

    let metrics = client.metrics().await.unwrap().unwrap();
    assert_eq!(metrics.completed_tasks, 1);
    assert_eq!(client.health().await.unwrap().status, "healthy");
}

#[tokio::test]
async fn client_maps_queue_full_and_auth() {
    let auth = AuthConfig {
        enabled: true,
        api_keys: ApiKeys::parse("key-1"),
    };
    let server = start_server(
        QueueConfig {
            max_queue_size: 1,
            metrics_enabled: false,
            ..QueueConfig::default()
        },
        auth,
    )
    .await;

    let anonymous = HttpTransport::new(&server.url, None).unwrap();
    assert!(matches!(
        anonymous.enqueue(&NewTask::new("a")).await,
        Err(Error::Unauthorized)
    ));

    let client =
        HttpTransport::new(&server.url, Some(SecretString::from("key-1".to_string()))).unwrap();
    client.enqueue(&NewTask::new("a")).await.unwrap();
    assert!(matches!(
        client.enqueue(&NewTask::new("b")).await,
        Err(Error::QueueFull { capacity: 1 })
    ));
    assert!(client.metrics().await.unwrap().is_none());
    assert_eq!(client.clear().await.unwrap(), 1);
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = HttpTransport::new(&url, None).unwrap();
    let err = client.position("a").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn turn_over_http() {
    let server = start_server(QueueConfig::default(), AuthConfig::default()).await;
    server.engine.enqueue(NewTask::new("holder")).await.unwrap();

    let transport = Arc::new(HttpTransport::new(&server.url, None).unwrap());
    let config = TurnConfig {
        poll_interval: Duration::from_millis(20),
        wait_timeout: Duration::from_secs(10),
        retry: RetryConfig::NONE,
    };
    let turn = Turn::new(transport, NewTask::new("worker"), config);
    let handle = tokio::spawn(turn.run(|| async { Ok(7) }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.engine.position("worker").await.position, 2);
    server.engine.release("holder").await.unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), 7);
    assert!(server.engine.is_empty().await);
}

#[tokio::test]
async fn route_names_are_refused_at_join() {
    let server = start_server(QueueConfig::default(), AuthConfig::default()).await;
    let transport = Arc::new(HttpTransport::new(&server.url, None).unwrap());

    for name in ["list", "next", "clear"] {
        assert!(matches!(
            transport.enqueue(&NewTask::new(name)).await,
            Err(Error::InvalidTask(_))
        ));
    }

    let config = TurnConfig {
        poll_interval: Duration::from_millis(20),
        wait_timeout: Duration::from_secs(10),
        retry: RetryConfig::NONE,
    };
    let turn = Turn::new(transport, NewTask::new("list"), config);
    let err = tokio::time::timeout(Duration::from_secs(2), turn.run(|| async { Ok(()) }))
        .await
        .expect("turn should fail without waiting")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTask(_)), "got {err:?}");
    assert!(server.engine.is_empty().await);
}

#[test]
fn rejects_bad_server_url() {
    assert!(matches!(
        HttpTransport::new("not a url", None),
        Err(Error::Config(_))
    ));
}
