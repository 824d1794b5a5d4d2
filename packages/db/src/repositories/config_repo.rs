//! Key/value configuration store.

use queue_core::QueueSettings;
use queue_core::settings::validate_entry;

use crate::{Database, DbError};

/// A stored configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

/// Repository for the `config` table.
#[derive(Debug, Clone)]
pub struct ConfigRepository {
    db: Database,
}

impl ConfigRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a value, `None` if the key was never set.
    pub async fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(value)
    }

    /// Insert or replace a value. Known keys must hold positive integers.
    pub async fn set(&self, key: &str, value: &str) -> Result<ConfigEntry, DbError> {
        let (key, value) = (key.trim(), value.trim());
        validate_entry(key, value).map_err(|e| DbError::Validation(e.to_string()))?;

        let entry = sqlx::query_as::<_, ConfigEntry>(
            r#"
            INSERT INTO config (key, value) VALUES (?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            RETURNING key, value
            "#,
        )
        .bind(key)
        .bind(value)
        .fetch_one(self.db.pool())
        .await?;

        tracing::info!(key = %entry.key, value = %entry.value, "config updated");
        Ok(entry)
    }

    /// All stored entries, sorted by key.
    pub async fn list(&self) -> Result<Vec<ConfigEntry>, DbError> {
        let entries =
            sqlx::query_as::<_, ConfigEntry>("SELECT key, value FROM config ORDER BY key")
                .fetch_all(self.db.pool())
                .await?;
        Ok(entries)
    }

    /// Typed queue settings with defaults for anything unset.
    pub async fn settings(&self) -> Result<QueueSettings, DbError> {
        let entries = self.list().await?;
        Ok(QueueSettings::from_entries(
            entries.iter().map(|e| (e.key.as_str(), e.value.as_str())),
        ))
    }
}
