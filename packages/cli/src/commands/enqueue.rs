use crate::context::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct EnqueueArgs {
    /// Command to run; the words are joined with spaces
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Attempts before the job is dead-lettered [default: config max_retries, else 3]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_retries: Option<u32>,
}

impl EnqueueArgs {
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

pub async fn run(ctx: &Context, args: EnqueueArgs) -> anyhow::Result<()> {
    let queue = ctx.open().await?;
    let job = queue
        .engine
        .enqueue(&args.command_line(), args.max_retries)
        .await?;

    println!("Job enqueued");
    println!("  ID:          {}", job.id);
    println!("  Command:     {}", job.command);
    println!("  Max retries: {}", job.max_retries);

    queue.close().await;
    Ok(())
}
