//! Database schema definitions.

use queue_core::settings::{
    BACKOFF_BASE_KEY, DEFAULT_BACKOFF_BASE, DEFAULT_LOCK_TIMEOUT_SECS, LOCK_TIMEOUT_KEY,
};

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables and indexes and seeds config defaults.
/// Safe to run from every process on every start.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::debug!("initializing database schema");

    sqlx::raw_sql(JOB_SCHEMA).execute(db.pool()).await?;
    sqlx::raw_sql(CONFIG_SCHEMA).execute(db.pool()).await?;

    let defaults = [
        (BACKOFF_BASE_KEY, DEFAULT_BACKOFF_BASE.to_string()),
        (LOCK_TIMEOUT_KEY, DEFAULT_LOCK_TIMEOUT_SECS.to_string()),
    ];
    for (key, value) in defaults {
        sqlx::query("INSERT OR IGNORE INTO config (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(db.pool())
            .await?;
    }

    tracing::debug!("database schema initialized");

    Ok(())
}

/// Job table schema.
const JOB_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    command TEXT NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('pending', 'processing', 'completed', 'failed', 'dead')),
    attempts INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL DEFAULT 3,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    retry_at TEXT,
    locked_by TEXT,
    locked_at TEXT,
    error_message TEXT,
    completed_at TEXT
);

-- Claim scans pending rows oldest first
CREATE INDEX IF NOT EXISTS idx_jobs_state_created ON jobs (state, created_at);
CREATE INDEX IF NOT EXISTS idx_jobs_retry_at ON jobs (retry_at);
CREATE INDEX IF NOT EXISTS idx_jobs_locked_by ON jobs (locked_by);
"#;

/// Config table schema.
const CONFIG_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
