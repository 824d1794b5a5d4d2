use anyhow::Context as _;
use queue_core::{JobId, JobState};

use super::{RULE, local_time, print_json};
use crate::context::Context;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum DlqCommands {
    /// List jobs that exhausted their retries
    List {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a dead job back to pending with a fresh attempt budget
    Retry {
        /// ID of the dead job
        job_id: String,
    },
}

pub async fn run(ctx: &Context, cmd: DlqCommands) -> anyhow::Result<()> {
    match cmd {
        DlqCommands::List { json } => list(ctx, json).await,
        DlqCommands::Retry { job_id } => retry(ctx, &job_id).await,
    }
}

async fn list(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let queue = ctx.open().await?;
    let dead = queue.engine.jobs().list_by_state(JobState::Dead).await?;
    queue.close().await;

    if json {
        return print_json(&dead);
    }

    if dead.is_empty() {
        println!("DLQ is empty");
        return Ok(());
    }

    println!("Dead Letter Queue ({} jobs)", dead.len());
    println!();
    for job in &dead {
        println!("ID:       {}", job.id);
        println!("Command:  {}", job.command);
        println!("Attempts: {} (max: {})", job.attempts, job.max_retries);
        if let Some(at) = job.completed_at {
            println!("Failed:   {}", local_time(at));
        }
        if let Some(error) = &job.error_message {
            println!("Error:    {error}");
        }
        println!("{RULE}");
    }
    println!();
    println!("To retry a job: queuectl dlq retry <job-id>");

    Ok(())
}

async fn retry(ctx: &Context, job_id: &str) -> anyhow::Result<()> {
    let id = JobId::parse(job_id).with_context(|| format!("invalid job id '{job_id}'"))?;

    let queue = ctx.open().await?;
    let job = queue.engine.retry_dlq_job(id).await?;
    queue.close().await;

    println!("Job {} moved back to the queue", job.id);
    println!("  It will be picked up by a worker shortly.");
    Ok(())
}
