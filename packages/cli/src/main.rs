//! queuectl - a durable background job queue for one host.
//!
//! Jobs are shell commands stored in SQLite under the data directory.
//! `queuectl worker start` launches detached worker processes that claim and
//! run them; everything else inspects or edits the queue.

mod args;
mod commands;
mod context;
mod logging;

use std::process::ExitCode;

use clap::Parser;

use args::Cli;
use commands::{Command, WorkerCommands};
use context::Context;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let ctx = Context::new(cli.data_dir);

    let logging = match &cli.command {
        Command::Worker(WorkerCommands::Run(_)) => logging::init_worker(&ctx),
        _ => logging::init_cli(),
    };
    if let Err(e) = logging {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }

    match commands::run(&ctx, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("command failed: {e:?}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
