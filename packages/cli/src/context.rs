//! Paths under the data directory and the handles opened from them.

use std::path::{Path, PathBuf};

use actors::{QueueEngine, RosterStore, WorkerCommand, WorkerSupervisor};
use anyhow::Context as _;
use db::repositories::{ConfigRepository, JobRepository};
use db::{Database, DbConfig};
use queue_core::QueueSettings;

pub const DB_FILE: &str = "queue.db";
pub const LOG_FILE: &str = "worker.log";

/// Where this invocation keeps its state.
#[derive(Debug, Clone)]
pub struct Context {
    data_dir: PathBuf,
}

/// An open queue: the database plus the engine built on it.
pub struct Queue {
    pub db: Database,
    pub engine: QueueEngine,
    pub settings: QueueSettings,
}

impl Queue {
    pub async fn close(self) {
        self.db.close().await;
    }
}

impl Context {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }

    pub fn ensure_data_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("failed to create data directory {}", self.data_dir.display())
        })
    }

    /// Open the database and read the queue settings.
    pub async fn open(&self) -> anyhow::Result<Queue> {
        self.ensure_data_dir()?;

        let path = self.db_path();
        let db = db::init(DbConfig::file(&path))
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;

        let config = ConfigRepository::new(db.clone());
        let settings = config.settings().await?;
        let jobs = JobRepository::new(db.clone());

        Ok(Queue {
            engine: QueueEngine::new(jobs, config),
            db,
            settings,
        })
    }

    /// The process manager, launching workers as `<this exe> --data-dir <abs> worker run`.
    pub fn supervisor(&self) -> anyhow::Result<WorkerSupervisor> {
        let program = std::env::current_exe().context("cannot locate the queuectl executable")?;
        let data_dir = std::path::absolute(&self.data_dir)
            .with_context(|| format!("bad data directory {}", self.data_dir.display()))?;

        let command = WorkerCommand::new(program)
            .arg("--data-dir")
            .arg(data_dir)
            .args(["worker", "run"]);

        Ok(WorkerSupervisor::new(
            RosterStore::in_dir(&self.data_dir),
            command,
        ))
    }
}
