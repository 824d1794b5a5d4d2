//! Job repository for CRUD operations and the atomic claim.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use queue_core::{Job, JobId, JobState, JobStats};
use queue_core::settings::DEFAULT_LOCK_TIMEOUT_SECS;
use sqlx::{QueryBuilder, Sqlite};

use crate::{Database, DbError};

/// Repository for job persistence operations.
#[derive(Debug, Clone)]
pub struct JobRepository {
    db: Database,
    lock_timeout: Duration,
}

/// Internal row type for the `jobs` table.
#[derive(Debug, sqlx::FromRow)]
struct JobRecord {
    id: String,
    command: String,
    state: String,
    attempts: i64,
    max_retries: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    retry_at: Option<DateTime<Utc>>,
    locked_by: Option<String>,
    locked_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    fn into_job(self) -> Result<Job, DbError> {
        let id = JobId::parse(&self.id)
            .map_err(|e| DbError::Corrupt(format!("job id '{}': {e}", self.id)))?;
        let state = self
            .state
            .parse::<JobState>()
            .map_err(|e| DbError::Corrupt(format!("job {id}: {e}")))?;
        let attempts = u32::try_from(self.attempts)
            .map_err(|_| DbError::Corrupt(format!("job {id}: attempts {}", self.attempts)))?;
        let max_retries = u32::try_from(self.max_retries)
            .map_err(|_| DbError::Corrupt(format!("job {id}: max_retries {}", self.max_retries)))?;

        Ok(Job {
            id,
            command: self.command,
            state,
            attempts,
            max_retries,
            created_at: self.created_at,
            updated_at: self.updated_at,
            retry_at: self.retry_at,
            locked_by: self.locked_by,
            locked_at: self.locked_at,
            error_message: self.error_message,
            completed_at: self.completed_at,
        })
    }
}

/// Field overrides applied together with a state change.
///
/// Each field is left alone when `None`; `Some(None)` writes NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub attempts: Option<u32>,
    pub retry_at: Option<Option<DateTime<Utc>>>,
    pub locked_by: Option<Option<String>>,
    pub locked_at: Option<Option<DateTime<Utc>>>,
    pub error_message: Option<Option<String>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn retry_at(mut self, retry_at: DateTime<Utc>) -> Self {
        self.retry_at = Some(Some(retry_at));
        self
    }

    pub fn clear_retry_at(mut self) -> Self {
        self.retry_at = Some(None);
        self
    }

    /// Record the worker holding the job.
    pub fn lock(mut self, worker_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.locked_by = Some(Some(worker_id.into()));
        self.locked_at = Some(Some(at));
        self
    }

    /// Clear both lock fields.
    pub fn unlock(mut self) -> Self {
        self.locked_by = Some(None);
        self.locked_at = Some(None);
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(Some(message.into()));
        self
    }

    pub fn clear_error_message(mut self) -> Self {
        self.error_message = Some(None);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(Some(at));
        self
    }
}

/// Conditions a row must still meet for an update to apply.
#[derive(Debug, Default)]
struct Guard {
    state: Option<JobState>,
    owner: Option<String>,
}

impl JobRepository {
    /// Create a repository with the default lock staleness window.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
        }
    }

    /// Set how old a lock must be before another worker may take the job over.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Create a new pending job in the database.
    pub async fn create(&self, command: &str, max_retries: u32) -> Result<Job, DbError> {
        if command.trim().is_empty() {
            return Err(DbError::Validation("command cannot be empty".into()));
        }

        let job = Job::new(command).with_max_retries(max_retries);

        let record = sqlx::query_as::<_, JobRecord>(
            r#"
            INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, updated_at)
            VALUES (?, ?, ?, 0, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(job.id.to_string())
        .bind(&job.command)
        .bind(job.state.as_str())
        .bind(i64::from(job.max_retries))
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(self.db.pool())
        .await?;

        record.into_job()
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<Job, DbError> {
        let record = sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await?;

        record
            .map(JobRecord::into_job)
            .transpose()?
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))
    }

    /// List jobs in a state, oldest first.
    pub async fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, DbError> {
        let records = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE state = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(state.as_str())
        .fetch_all(self.db.pool())
        .await?;

        records.into_iter().map(JobRecord::into_job).collect()
    }

    /// Set a job's state and apply field overrides.
    pub async fn update_state(
        &self,
        id: JobId,
        state: JobState,
        update: JobUpdate,
    ) -> Result<Job, DbError> {
        self.apply(id, state, update, Guard::default())
            .await?
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))
    }

    /// Move a job from `from` to `to`, but only if it is still in `from` and,
    /// when `owner` is given, still locked by that worker.
    ///
    /// Returns `None` when the guard did not match (including a missing id).
    pub async fn transition(
        &self,
        id: JobId,
        from: JobState,
        to: JobState,
        update: JobUpdate,
        owner: Option<&str>,
    ) -> Result<Option<Job>, DbError> {
        let guard = Guard {
            state: Some(from),
            owner: owner.map(str::to_string),
        };
        self.apply(id, to, update, guard).await
    }

    async fn apply(
        &self,
        id: JobId,
        state: JobState,
        update: JobUpdate,
        guard: Guard,
    ) -> Result<Option<Job>, DbError> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE jobs SET state = ");
        query.push_bind(state.as_str());
        query.push(", updated_at = ").push_bind(Utc::now());

        if let Some(attempts) = update.attempts {
            query.push(", attempts = ").push_bind(i64::from(attempts));
        }
        if let Some(retry_at) = update.retry_at {
            query.push(", retry_at = ").push_bind(retry_at);
        }
        if let Some(locked_by) = update.locked_by {
            query.push(", locked_by = ").push_bind(locked_by);
        }
        if let Some(locked_at) = update.locked_at {
            query.push(", locked_at = ").push_bind(locked_at);
        }
        if let Some(error_message) = update.error_message {
            query.push(", error_message = ").push_bind(error_message);
        }
        if let Some(completed_at) = update.completed_at {
            query.push(", completed_at = ").push_bind(completed_at);
        }

        query.push(" WHERE id = ").push_bind(id.to_string());
        if let Some(from) = guard.state {
            query.push(" AND state = ").push_bind(from.as_str());
        }
        if let Some(owner) = guard.owner {
            query.push(" AND locked_by = ").push_bind(owner);
        }
        query.push(" RETURNING *");

        let record = query
            .build_query_as::<JobRecord>()
            .fetch_optional(self.db.pool())
            .await?;

        record.map(JobRecord::into_job).transpose()
    }

    /// Atomically claim the oldest eligible job for `worker_id`.
    ///
    /// Eligible: pending with its backoff elapsed and no live lock, or
    /// processing under a lock older than the staleness window. Selection and
    /// locking happen in one statement, so two workers can never both win
    /// the same row.
    pub async fn claim_next(&self, worker_id: &str) -> Result<Option<Job>, DbError> {
        self.claim_next_within(worker_id, self.lock_timeout).await
    }

    /// [`Self::claim_next`] with an explicit staleness window.
    pub async fn claim_next_within(
        &self,
        worker_id: &str,
        lock_timeout: Duration,
    ) -> Result<Option<Job>, DbError> {
        let now = Utc::now();
        let stale_before = TimeDelta::from_std(lock_timeout)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let record = sqlx::query_as::<_, JobRecord>(
            r#"
            UPDATE jobs
            SET state = 'processing',
                locked_by = ?1,
                locked_at = ?2,
                updated_at = ?2
            WHERE id = (
                SELECT id FROM jobs
                WHERE (state = 'pending'
                       AND (retry_at IS NULL OR retry_at <= ?2)
                       AND (locked_by IS NULL OR locked_at < ?3))
                   OR (state = 'processing' AND locked_at < ?3)
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .bind(stale_before)
        .fetch_optional(self.db.pool())
        .await?;

        let job = record.map(JobRecord::into_job).transpose()?;
        if let Some(job) = &job {
            tracing::debug!(job_id = %job.id, worker_id, "claimed job");
        }
        Ok(job)
    }

    /// Count jobs in every state.
    pub async fn stats(&self) -> Result<JobStats, DbError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT state, COUNT(*) FROM jobs GROUP BY state",
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut stats = JobStats::default();
        for (state, count) in rows {
            let state = state
                .parse::<JobState>()
                .map_err(|e| DbError::Corrupt(e.to_string()))?;
            stats.record(state, u64::try_from(count).unwrap_or_default());
        }

        Ok(stats)
    }
}
