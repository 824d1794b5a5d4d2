use std::io::{SeekFrom, Write};
use std::time::Duration;

use anyhow::Context as _;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::context::Context;

const FOLLOW_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, clap::Args)]
pub struct LogsArgs {
    /// Keep printing new lines as workers write them
    #[arg(short, long)]
    pub follow: bool,

    /// Number of recent lines to show
    #[arg(short = 'n', long, default_value_t = 50)]
    pub lines: usize,
}

/// The last `count` non-blank lines of `content`.
pub fn tail_lines(content: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].to_vec()
}

pub async fn run(ctx: &Context, args: LogsArgs) -> anyhow::Result<()> {
    let path = ctx.log_path();
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        println!("No logs found. Workers haven't run yet.");
        return Ok(());
    }

    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    for line in tail_lines(&content, args.lines) {
        println!("{line}");
    }

    if args.follow {
        follow(&path, content.len() as u64).await?;
    }
    Ok(())
}

/// Print whatever is appended after `offset` until Ctrl-C.
async fn follow(path: &std::path::Path, mut offset: u64) -> anyhow::Result<()> {
    eprintln!("Following logs (Ctrl+C to stop)...");
    let mut interval = tokio::time::interval(FOLLOW_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => return Ok(()),
            _ = interval.tick() => {}
        }

        let mut file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        if len < offset {
            // Truncated or replaced.
            offset = 0;
        }
        if len == offset {
            continue;
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let mut appended = Vec::new();
        file.read_to_end(&mut appended).await?;
        offset += appended.len() as u64;
        print!("{}", String::from_utf8_lossy(&appended));
        std::io::stdout().flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_skips_blank_lines() {
        let content = "one\n\ntwo\nthree\n   \nfour\n";
        assert_eq!(tail_lines(content, 2), vec!["three", "four"]);
        assert_eq!(tail_lines(content, 10), vec!["one", "two", "three", "four"]);
        assert!(tail_lines(content, 0).is_empty());
        assert!(tail_lines("", 5).is_empty());
    }
}
