//! turnq CLI: run the queue server or take a turn against one.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tracing::{info, warn};

use turnq::client::{HttpTransport, Transport, Turn, TurnConfig};
use turnq::config::Config;
use turnq::db::Db;
use turnq::engine::QueueEngine;
use turnq::model::{NewTask, TaskView};
use turnq::server::{self, AppState};
use turnq::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "turnq", about = "Named tasks taking turns in a ranked line")]
struct Cli {
    /// Queue server URL
    #[arg(long, global = true, env = "TURNQ_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,
    /// API key sent as X-API-Key
    #[arg(long, global = true, env = "TURNQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the queue server
    Serve,
    /// Wait for a turn, run a command, release
    Run {
        /// Task name
        #[arg(long)]
        name: String,
        /// Priority (higher = sooner)
        #[arg(long, default_value_t = 0)]
        priority: i64,
        /// Seconds between position polls
        #[arg(long, default_value_t = 5)]
        poll_interval: u64,
        /// Give up after waiting this many seconds [default: TASK_TIMEOUT or 3600]
        #[arg(long)]
        timeout: Option<u64>,
        /// Command to run once at the head of the line
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Join the line
    Join {
        name: String,
        #[arg(long, default_value_t = 0)]
        priority: i64,
        /// JSON metadata attached to the task
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Show a task's position
    Position { name: String },
    /// Release the head of the line (identity-checked when a name is given)
    Release { name: Option<String> },
    /// Remove a task wherever it stands
    Remove { name: String },
    /// List queued tasks
    List,
    /// Drop every queued task
    Clear,
    /// Show queue metrics
    Metrics,
    /// Server health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cmd_serve().await,
        command => {
            let _guard = init_telemetry(TelemetryConfig {
                endpoint: None,
                service_name: "turnq-client".to_string(),
                default_filter: "warn".to_string(),
            })?;
            let api_key = cli.api_key.map(SecretString::from);
            let client = HttpTransport::new(&cli.server, api_key)?;
            cmd_client(client, command).await
        }
    }
}

async fn cmd_client(client: HttpTransport, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve => anyhow::bail!("serve is not a client command"),
        Command::Run {
            name,
            priority,
            poll_interval,
            timeout,
            command,
        } => {
            let mut config = match timeout {
                Some(secs) => TurnConfig {
                    wait_timeout: Duration::from_secs(secs),
                    ..TurnConfig::default()
                },
                None => TurnConfig::from_config(&Config::from_env()?),
            };
            config.poll_interval = Duration::from_secs(poll_interval);
            cmd_run(client, NewTask::new(name).priority(priority), config, command).await
        }
        Command::Join {
            name,
            priority,
            metadata,
        } => {
            let mut task = NewTask::new(name).priority(priority);
            if let Some(json) = metadata {
                task = task.metadata(serde_json::from_str(&json)?);
            }
            let enqueued = client.enqueue(&task).await?;
            let verb = if enqueued.created { "Joined" } else { "Already queued" };
            println!(
                "{verb}: {} at position {} of {}",
                task.name(),
                enqueued.position,
                enqueued.queue_size
            );
            Ok(())
        }
        Command::Position { name } => {
            let report = client.position(&name).await?;
            if report.is_not_found() {
                println!("{name}: not in queue ({} queued)", report.queue_size);
            } else {
                println!("{name}: position {} of {}", report.position, report.queue_size);
            }
            Ok(())
        }
        Command::Release { name } => {
            let released = match name {
                Some(name) => client.release(&name).await?,
                None => client.release_head().await?,
            };
            match released.next {
                Some(next) => println!("Released: {next} ({} remaining)", released.remaining),
                None => println!("Queue is empty."),
            }
            Ok(())
        }
        Command::Remove { name } => {
            client.remove(&name).await?;
            println!("Removed: {name}");
            Ok(())
        }
        Command::List => {
            print_tasks(&client.list().await?);
            Ok(())
        }
        Command::Clear => {
            let removed = client.clear().await?;
            println!("Cleared {removed} task(s).");
            Ok(())
        }
        Command::Metrics => {
            match client.metrics().await? {
                Some(metrics) => println!("{}", serde_json::to_string_pretty(&metrics)?),
                None => println!("Metrics are disabled on this server."),
            }
            Ok(())
        }
        Command::Health => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(())
        }
    }
}

async fn cmd_serve() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "turnq".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let db = Db::open(&config.database_path).await?;
    db.migrate().await?;

    let cutoff = chrono::Duration::from_std(config.metrics_retention)
        .ok()
        .and_then(|retention| chrono::Utc::now().checked_sub_signed(retention));
    match cutoff {
        Some(cutoff) => match db.prune_metrics(cutoff).await {
            Ok(pruned) if pruned > 0 => info!(pruned, "pruned old metric rows"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to prune metrics"),
        },
        None => warn!(
            retention_secs = config.metrics_retention.as_secs(),
            "metric retention out of range, skipping prune"
        ),
    }

    let engine = QueueEngine::open(config.queue.clone(), Arc::new(db)).await;
    let listener = TcpListener::bind(config.bind_addr).await?;
    let state = AppState::new(engine, config.auth.clone());

    server::serve(listener, state, async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;
    Ok(())
}

async fn cmd_run(
    client: HttpTransport,
    task: NewTask,
    config: TurnConfig,
    command: Vec<String>,
) -> anyhow::Result<()> {
    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("no command given");
    };

    let turn = Turn::new(Arc::new(client), task, config);
    let status = turn
        .run(|| async {
            let status = tokio::process::Command::new(program)
                .args(args)
                .status()
                .await?;
            if !status.success() {
                anyhow::bail!("{program} exited with {status}");
            }
            Ok::<_, anyhow::Error>(status)
        })
        .await?;

    info!(%status, "command finished");
    Ok(())
}

fn print_tasks(tasks: &[TaskView]) {
    if tasks.is_empty() {
        println!("Queue is empty.");
        return;
    }

    println!("{:<4}  {:<30}  {:<4}  ADDED", "POS", "NAME", "PRI");
    println!("{}", "-".repeat(64));
    for task in tasks {
        println!(
            "{:<4}  {:<30}  {:<4}  {}",
            task.position,
            task.name,
            task.priority,
            task.added_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("\n{} task(s)", tasks.len());
}
