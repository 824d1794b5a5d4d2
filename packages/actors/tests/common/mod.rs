#![allow(dead_code)]

use std::error::Error;
use std::time::Duration;

use tempfile::TempDir;

use actors::{CommandExecutor, ExecutionFuture, FnExecutor, QueueEngine};
use db::Database;
use db::repositories::{ConfigRepository, JobRepository, JobUpdate};
use db::DbConfig;
use queue_core::{ExecutionError, ExecutionResult, JobId, JobState};

/// A fresh database file in its own temp dir; the dir must outlive the handle.
pub async fn setup_db() -> Result<(TempDir, Database), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let config = DbConfig::file(dir.path().join("queue.db"))
        .with_max_connections(4)
        .with_busy_timeout(Duration::from_secs(10));
    let db = db::init(config).await?;
    Ok((dir, db))
}

/// An engine over a fresh database, running commands through [`script_executor`].
pub async fn setup_engine() -> Result<(TempDir, QueueEngine), Box<dyn Error>> {
    let (dir, db) = setup_db().await?;
    let engine = QueueEngine::new(JobRepository::new(db.clone()), ConfigRepository::new(db))
        .with_executor(script_executor());
    Ok((dir, engine))
}

/// Executes a tiny command language without a shell:
/// `fail ...` exits 1, `sleep <ms>` waits then succeeds, anything else
/// succeeds and echoes itself.
pub fn script_executor() -> impl CommandExecutor {
    FnExecutor::new(|command: &str| -> ExecutionFuture {
        let command = command.to_string();
        Box::pin(async move {
            if command.starts_with("fail") {
                return ExecutionResult::failed(
                    ExecutionError::Exit {
                        code: 1,
                        stderr: "boom".into(),
                    },
                    "",
                );
            }
            if let Some(ms) = command.strip_prefix("sleep ").and_then(|ms| ms.parse().ok()) {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            ExecutionResult::succeeded(command)
        })
    })
}

/// Make a backed-off job claimable right away.
pub async fn skip_backoff(jobs: &JobRepository, id: JobId) -> Result<(), Box<dyn Error>> {
    jobs.update_state(id, JobState::Pending, JobUpdate::new().clear_retry_at())
        .await?;
    Ok(())
}

/// Poll until `done` holds or `timeout` passes.
pub async fn wait_until<F, Fut>(timeout: Duration, mut done: F) -> Result<bool, Box<dyn Error>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool, Box<dyn Error>>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if done().await? {
            return Ok(true);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    done().await
}
