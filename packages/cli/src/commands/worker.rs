use std::sync::Arc;
use std::time::Duration;

use actors::{ActorRef, WorkerArgs, WorkerMessage, start_worker};
use chrono::Local;

use super::print_json;
use crate::context::Context;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum WorkerCommands {
    /// Start worker processes in the background
    Start {
        /// Number of workers to start
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },
    /// Ask every running worker to finish its current job and exit
    Stop,
    /// List running worker processes
    List {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a worker in the foreground (used by `worker start`)
    #[command(hide = true)]
    Run(WorkerRunArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct WorkerRunArgs {
    /// Milliseconds to wait between polls of an empty queue
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

pub async fn run(ctx: &Context, cmd: WorkerCommands) -> anyhow::Result<()> {
    match cmd {
        WorkerCommands::Start { count } => start(ctx, count).await,
        WorkerCommands::Stop => stop(ctx).await,
        WorkerCommands::List { json } => list(ctx, json).await,
        WorkerCommands::Run(args) => run_foreground(ctx, args).await,
    }
}

async fn start(ctx: &Context, count: u32) -> anyhow::Result<()> {
    // Create the schema before several workers race to do it.
    ctx.open().await?.close().await;

    println!("Starting {count} worker(s)...");
    let supervisor = ctx.supervisor()?;
    let spawned = supervisor.spawn(count as usize).await?;
    for record in &spawned {
        println!("  Worker started (PID: {})", record.pid);
    }

    println!();
    println!("Workers are running in the background");
    println!("  View status:  queuectl status");
    println!("  Stop workers: queuectl worker stop");
    Ok(())
}

async fn stop(ctx: &Context) -> anyhow::Result<()> {
    let outcomes = ctx.supervisor()?.stop_all().await?;
    if outcomes.is_empty() {
        println!("No active workers found");
        return Ok(());
    }

    println!("Stopping {} worker(s)...", outcomes.len());
    for outcome in &outcomes {
        if outcome.stopped {
            println!("  Worker stopped (PID: {})", outcome.pid);
        } else {
            println!("  Failed to stop worker (PID: {})", outcome.pid);
        }
    }
    Ok(())
}

async fn list(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let workers = ctx.supervisor()?.list_active().await?;

    if json {
        return print_json(&workers);
    }

    if workers.is_empty() {
        println!("No active workers");
        return Ok(());
    }

    println!("Active workers ({})", workers.len());
    for worker in &workers {
        println!(
            "  PID {:<8} started {}",
            worker.pid,
            worker.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Entry point of a spawned worker process.
async fn run_foreground(ctx: &Context, args: WorkerRunArgs) -> anyhow::Result<()> {
    let queue = ctx.open().await?;
    let worker_id = format!("worker-{}", std::process::id());
    tracing::info!(
        worker_id,
        backoff_base = queue.settings.backoff_base,
        lock_timeout_secs = queue.settings.lock_timeout.as_secs(),
        "opened {}",
        ctx.db_path().display()
    );

    // Handlers must be in place before the first claim.
    let shutdown = ShutdownSignal::install()?;

    let engine = Arc::new(queue.engine);
    let worker_args = WorkerArgs::new(worker_id, engine)
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));
    let (worker, handle) = start_worker(worker_args).await?;

    let signals = tokio::spawn(forward_shutdown(shutdown, worker));
    let finished = handle.await;
    signals.abort();
    queue.db.close().await;

    finished?;
    Ok(())
}

async fn forward_shutdown(shutdown: ShutdownSignal, worker: ActorRef<WorkerMessage>) {
    shutdown.recv().await;
    tracing::info!("shutdown requested");
    let _ = worker.send_message(WorkerMessage::Shutdown);
}

/// SIGTERM or SIGINT, registered up front.
#[cfg(unix)]
struct ShutdownSignal {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    fn install() -> anyhow::Result<Self> {
        use anyhow::Context as _;
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            terminate: signal(SignalKind::terminate()).context("cannot listen for SIGTERM")?,
            interrupt: signal(SignalKind::interrupt()).context("cannot listen for SIGINT")?,
        })
    }

    async fn recv(mut self) {
        tokio::select! {
            _ = self.terminate.recv() => {}
            _ = self.interrupt.recv() => {}
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    fn install() -> anyhow::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
