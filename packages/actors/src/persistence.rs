//! File-backed worker roster.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Roster file name inside the data directory.
pub const ROSTER_FILE: &str = "workers.json";

/// A worker process spawned by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl WorkerRecord {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            started_at: Utc::now(),
        }
    }
}

/// Reads and writes the roster as pretty JSON.
///
/// Writes go to a temp file that is renamed over the roster, so a reader
/// never sees a half-written file.
#[derive(Debug, Clone)]
pub struct RosterStore {
    path: PathBuf,
}

impl RosterStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The roster inside `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(ROSTER_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the roster; a missing file is an empty roster.
    pub async fn load(&self) -> Result<Vec<WorkerRecord>, PersistenceError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if json.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records = serde_json::from_str(&json)?;
        tracing::debug!("Loaded roster from {:?}", self.path);
        Ok(records)
    }

    /// Replace the roster.
    pub async fn save(&self, records: &[WorkerRecord]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(records)?;
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.path).await?;

        tracing::debug!("Saved {} worker(s) to {:?}", records.len(), self.path);
        Ok(())
    }
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_roster_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::in_dir(dir.path());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::in_dir(dir.path().join("nested"));
        let records = vec![WorkerRecord::new(41), WorkerRecord::new(42)];

        store.save(&records).await.unwrap();

        assert_eq!(store.load().await.unwrap(), records);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_roster_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::in_dir(dir.path());
        std::fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load().await, Err(PersistenceError::Json(_))));
    }
}
