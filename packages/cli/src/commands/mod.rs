//! One module per subcommand, each with its arguments and a `run` function.

pub mod config;
pub mod dlq;
pub mod enqueue;
pub mod list;
pub mod logs;
pub mod status;
pub mod worker;

use chrono::{DateTime, Local, Utc};

use crate::context::Context;

pub use config::ConfigCommands;
pub use dlq::DlqCommands;
pub use worker::WorkerCommands;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Add a job to the queue
    Enqueue(enqueue::EnqueueArgs),
    /// Show job counts and active workers
    Status(status::StatusArgs),
    /// List jobs in one state
    List(list::ListArgs),
    /// Inspect and retry dead-lettered jobs
    #[command(subcommand)]
    Dlq(DlqCommands),
    /// Start, stop and list worker processes
    #[command(subcommand)]
    Worker(WorkerCommands),
    /// Read and change queue settings
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Show the worker log
    Logs(logs::LogsArgs),
}

pub async fn run(ctx: &Context, cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Enqueue(args) => enqueue::run(ctx, args).await,
        Command::Status(args) => status::run(ctx, args).await,
        Command::List(args) => list::run(ctx, args).await,
        Command::Dlq(cmd) => dlq::run(ctx, cmd).await,
        Command::Worker(cmd) => worker::run(ctx, cmd).await,
        Command::Config(cmd) => config::run(ctx, cmd).await,
        Command::Logs(args) => logs::run(ctx, args).await,
    }
}

/// Local wall-clock rendering for reports.
pub(crate) fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) const RULE: &str = "------------------------------------------------------------";
