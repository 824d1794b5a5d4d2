use queue_core::{Job, JobState};

use super::{RULE, local_time, print_json};
use crate::context::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct ListArgs {
    /// State to list: pending, processing, completed, failed or dead
    #[arg(short, long, default_value = "pending")]
    pub state: JobState,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &Context, args: ListArgs) -> anyhow::Result<()> {
    let queue = ctx.open().await?;
    let jobs = queue.engine.jobs().list_by_state(args.state).await?;
    queue.close().await;

    if args.json {
        return print_json(&jobs);
    }

    if jobs.is_empty() {
        println!("No jobs in state: {}", args.state);
        return Ok(());
    }

    println!("Jobs (state: {})", args.state);
    println!();
    for job in &jobs {
        print_job(job);
    }
    println!();
    println!("Total: {} jobs", jobs.len());

    Ok(())
}

fn print_job(job: &Job) {
    println!("ID:       {}", job.id);
    println!("Command:  {}", job.command);
    println!("Attempts: {}/{}", job.attempts, job.max_retries);
    println!("Created:  {}", local_time(job.created_at));
    if let Some(retry_at) = job.retry_at {
        println!("Retry at: {}", local_time(retry_at));
    }
    if let Some(worker) = &job.locked_by {
        println!("Worker:   {worker}");
    }
    if let Some(error) = &job.error_message {
        println!("Error:    {error}");
    }
    println!("{RULE}");
}
