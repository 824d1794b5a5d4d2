//! Job lifecycle policy: execution, retries with backoff, and the
//! dead-letter queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use db::DbError;
use db::repositories::{ConfigRepository, JobRepository, JobUpdate};
use queue_core::{DEFAULT_MAX_RETRIES, ExecutionResult, Job, JobEvent, JobId, JobState};

use crate::executor::{CommandExecutor, ShellExecutor};

/// Longest delay a retry will ever wait.
pub const MAX_BACKOFF: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors raised by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {id} is {state}, expected {expected}")]
    InvalidState {
        id: JobId,
        state: JobState,
        expected: JobState,
    },

    /// Another worker took the job over; this worker's result was discarded.
    #[error("job {job_id} is no longer held by {worker}")]
    LockLost { job_id: JobId, worker: String },

    #[error(transparent)]
    Db(#[from] DbError),
}

/// What running a claimed job produced.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub result: ExecutionResult,
    pub elapsed: Duration,
}

/// Delay before the next attempt after `attempts` failures: `base^attempts`
/// seconds, capped at [`MAX_BACKOFF`].
pub fn backoff_delay(base: u32, attempts: u32) -> Duration {
    let secs = u64::from(base)
        .checked_pow(attempts)
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF.as_secs());
    Duration::from_secs(secs)
}

fn emit(event: JobEvent) {
    let at = event.timestamp();
    match event.job_id() {
        Some(job_id) => tracing::info!(%job_id, %at, "{}", event.description()),
        None => tracing::info!(%at, "{}", event.description()),
    }
}

/// Owns the job lifecycle on top of the repositories.
#[derive(Clone)]
pub struct QueueEngine {
    jobs: JobRepository,
    config: ConfigRepository,
    executor: Arc<dyn CommandExecutor>,
}

impl QueueEngine {
    /// Create an engine that runs commands through the shell.
    pub fn new(jobs: JobRepository, config: ConfigRepository) -> Self {
        Self {
            jobs,
            config,
            executor: Arc::new(ShellExecutor::new()),
        }
    }

    pub fn with_executor(mut self, executor: impl CommandExecutor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    pub fn jobs(&self) -> &JobRepository {
        &self.jobs
    }

    pub fn config(&self) -> &ConfigRepository {
        &self.config
    }

    /// Add a job. Without an explicit ceiling the configured `max_retries`
    /// applies, then the built-in default.
    pub async fn enqueue(&self, command: &str, max_retries: Option<u32>) -> Result<Job, EngineError> {
        let max_retries = match max_retries {
            Some(n) => n,
            None => self
                .config
                .settings()
                .await?
                .max_retries
                .unwrap_or(DEFAULT_MAX_RETRIES),
        };

        let job = self.jobs.create(command, max_retries).await?;
        emit(JobEvent::JobEnqueued {
            job: job.clone(),
            timestamp: Utc::now(),
        });
        Ok(job)
    }

    /// Claim the next eligible job, judging lock staleness by the current
    /// `lock_timeout_seconds` setting.
    pub async fn claim(&self, worker_id: &str) -> Result<Option<Job>, EngineError> {
        let settings = self.config.settings().await?;
        let job = self
            .jobs
            .claim_next_within(worker_id, settings.lock_timeout)
            .await?;
        Ok(job)
    }

    pub async fn execute_command(&self, command: &str) -> ExecutionResult {
        self.executor.execute(command).await
    }

    /// Run a claimed job's command.
    pub async fn process(&self, job: &Job) -> JobOutcome {
        emit(JobEvent::JobStarted {
            job_id: job.id,
            command: job.command.clone(),
            worker_id: job.locked_by.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        let result = self.execute_command(&job.command).await;

        JobOutcome {
            job_id: job.id,
            result,
            elapsed: started.elapsed(),
        }
    }

    /// Apply a [`JobOutcome`] to its job through the success or failure path.
    pub async fn record(&self, job: &Job, outcome: &JobOutcome) -> Result<Job, EngineError> {
        if !outcome.result.success {
            return self
                .handle_failure(job, &outcome.result.failure_message())
                .await;
        }

        let completed = self.handle_success(job).await?;
        emit(JobEvent::JobCompleted {
            job_id: job.id,
            output: outcome.result.output.clone(),
            duration_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
        });
        Ok(completed)
    }

    /// Mark a claimed job completed.
    pub async fn handle_success(&self, job: &Job) -> Result<Job, EngineError> {
        let update = JobUpdate::new()
            .completed_at(Utc::now())
            .clear_retry_at()
            .unlock();
        self.settle(job, JobState::Completed, update).await
    }

    /// Count a failed attempt, then schedule a retry or dead-letter the job.
    pub async fn handle_failure(&self, job: &Job, error_message: &str) -> Result<Job, EngineError> {
        let settings = self.config.settings().await?;
        let attempts = job.attempts.saturating_add(1);
        let ceiling = settings.retry_ceiling(job.max_retries);
        let now = Utc::now();

        if attempts >= ceiling {
            let update = JobUpdate::new()
                .attempts(attempts)
                .error_message(error_message)
                .completed_at(now)
                .clear_retry_at()
                .unlock();
            let dead = self.settle(job, JobState::Dead, update).await?;
            emit(JobEvent::JobDeadLettered {
                job_id: job.id,
                error: error_message.to_string(),
                attempts,
                timestamp: now,
            });
            return Ok(dead);
        }

        let delay = backoff_delay(settings.backoff_base, attempts);
        let retry_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let update = JobUpdate::new()
            .attempts(attempts)
            .error_message(error_message)
            .retry_at(retry_at)
            .unlock();
        let pending = self.settle(job, JobState::Pending, update).await?;
        emit(JobEvent::JobFailed {
            job_id: job.id,
            error: error_message.to_string(),
            attempts,
            max_attempts: ceiling,
            retry_at,
            timestamp: now,
        });
        Ok(pending)
    }

    /// Move a dead job back to pending with a fresh attempt budget.
    pub async fn retry_dlq_job(&self, id: JobId) -> Result<Job, EngineError> {
        let update = JobUpdate::new()
            .attempts(0)
            .clear_error_message()
            .clear_retry_at()
            .unlock();

        match self
            .jobs
            .transition(id, JobState::Dead, JobState::Pending, update, None)
            .await?
        {
            Some(job) => {
                emit(JobEvent::JobRequeued {
                    job_id: id,
                    timestamp: Utc::now(),
                });
                Ok(job)
            }
            None => {
                let current = self.lookup(id).await?;
                Err(EngineError::InvalidState {
                    id,
                    state: current.state,
                    expected: JobState::Dead,
                })
            }
        }
    }

    /// Leave `processing`, but only while the claiming worker still holds the lock.
    async fn settle(&self, job: &Job, to: JobState, update: JobUpdate) -> Result<Job, EngineError> {
        let owner = job.locked_by.as_deref();
        match self
            .jobs
            .transition(job.id, JobState::Processing, to, update, owner)
            .await?
        {
            Some(updated) => Ok(updated),
            None => {
                self.lookup(job.id).await?;
                Err(EngineError::LockLost {
                    job_id: job.id,
                    worker: owner.unwrap_or_default().to_string(),
                })
            }
        }
    }

    async fn lookup(&self, id: JobId) -> Result<Job, EngineError> {
        match self.jobs.get(id).await {
            Ok(job) => Ok(job),
            Err(DbError::NotFound(_)) => Err(EngineError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_exponential_in_attempts() {
        assert_eq!(backoff_delay(2, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(3, 2), Duration::from_secs(9));
        assert_eq!(backoff_delay(1, 10), Duration::from_secs(1));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(2, 40), MAX_BACKOFF);
        assert_eq!(backoff_delay(u32::MAX, u32::MAX), MAX_BACKOFF);
    }
}
