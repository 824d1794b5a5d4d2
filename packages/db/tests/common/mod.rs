use std::error::Error;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use db::{Database, DbConfig};

/// A fresh database file in its own temp dir; the dir must outlive the handle.
pub async fn setup_db() -> Result<(TempDir, Database), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let db = open_file(&dir.path().join("queue.db")).await?;
    Ok((dir, db))
}

/// Open (or create) a database file at `path`.
pub async fn open_file(path: &Path) -> Result<Database, Box<dyn Error>> {
    let config = DbConfig::file(path)
        .with_max_connections(4)
        .with_busy_timeout(Duration::from_secs(10));
    Ok(db::init(config).await?)
}
