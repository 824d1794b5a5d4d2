//! Database connection management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use thiserror::Error;

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// Private in-memory database.
    Memory,
    /// Database file, used as a filesystem path and never parsed as a URL.
    File(PathBuf),
}

impl fmt::Display for DbLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str(":memory:"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: DbLocation,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long a statement waits for another process's write lock.
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            location: DbLocation::Memory,
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    ///
    /// An in-memory database lives as long as its single connection.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for a database file, created if missing.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            location: DbLocation::File(path.as_ref().to_path_buf()),
            max_connections: 4,
            ..Default::default()
        }
    }

    /// Set the connection pool size.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    fn is_memory(&self) -> bool {
        self.location == DbLocation::Memory
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, DbError> {
        let options = match &self.location {
            DbLocation::Memory => SqliteConnectOptions::from_str("sqlite::memory:")?,
            DbLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        };
        Ok(options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout))
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Handle to the shared job store.
///
/// Cheap to clone; every clone uses the same connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a connection pool for the given configuration.
    #[tracing::instrument(skip_all, fields(location = %config.location))]
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let options = config.connect_options()?;

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if config.is_memory() {
            // Dropping the last connection would discard the data.
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;

        tracing::debug!("database pool created");
        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection, waiting for in-flight statements.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::debug!("database pool closed");
    }
}
