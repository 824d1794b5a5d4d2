use chrono::Local;
use serde_json::json;

use super::print_json;
use crate::context::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct StatusArgs {
    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &Context, args: StatusArgs) -> anyhow::Result<()> {
    let queue = ctx.open().await?;
    let stats = queue.engine.jobs().stats().await?;
    let workers = ctx.supervisor()?.list_active().await?;
    queue.close().await;

    if args.json {
        return print_json(&json!({ "jobs": stats, "workers": workers }));
    }

    println!("Queue Status");
    println!();
    println!("Jobs:");
    println!("  Pending:     {}", stats.pending);
    println!("  Processing:  {}", stats.processing);
    println!("  Completed:   {}", stats.completed);
    println!("  Failed:      {}", stats.failed);
    println!("  Dead (DLQ):  {}", stats.dead);
    println!("  ---------------------");
    println!("  Total:       {}", stats.total);
    println!();
    println!("Workers:");
    println!("  Active:      {}", workers.len());
    for worker in &workers {
        println!(
            "    - PID {} (started: {})",
            worker.pid,
            worker.started_at.with_timezone(&Local).format("%H:%M:%S")
        );
    }

    Ok(())
}
