//! Progress events written to the operator log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Job, JobId};

/// Events emitted by the queue as jobs and workers move through their lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    // Job events
    /// A new job was enqueued.
    JobEnqueued { job: Job, timestamp: DateTime<Utc> },
    /// A worker claimed a job and is about to run it.
    JobStarted {
        job_id: JobId,
        command: String,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A job's command exited successfully.
    JobCompleted {
        job_id: JobId,
        output: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job's command failed; it will be retried after a backoff.
    JobFailed {
        job_id: JobId,
        error: String,
        attempts: u32,
        max_attempts: u32,
        retry_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    /// A job exhausted its retries and moved to the dead-letter queue.
    JobDeadLettered {
        job_id: JobId,
        error: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
    /// An operator moved a job out of the dead-letter queue.
    JobRequeued { job_id: JobId, timestamp: DateTime<Utc> },

    // Worker events
    /// A worker started polling.
    WorkerStarted {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker was asked to stop and will exit after its current job.
    WorkerStopping {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker exited its loop.
    WorkerStopped {
        worker_id: String,
        processed: u64,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobEnqueued { timestamp, .. }
            | JobEvent::JobStarted { timestamp, .. }
            | JobEvent::JobCompleted { timestamp, .. }
            | JobEvent::JobFailed { timestamp, .. }
            | JobEvent::JobDeadLettered { timestamp, .. }
            | JobEvent::JobRequeued { timestamp, .. }
            | JobEvent::WorkerStarted { timestamp, .. }
            | JobEvent::WorkerStopping { timestamp, .. }
            | JobEvent::WorkerStopped { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobEvent::JobEnqueued { job, .. } => Some(job.id),
            JobEvent::JobStarted { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. }
            | JobEvent::JobDeadLettered { job_id, .. }
            | JobEvent::JobRequeued { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// Get a one-line description of this event for the log.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobEnqueued { job, .. } => {
                format!("Job {} enqueued: {}", job.id, job.command)
            }
            JobEvent::JobStarted {
                job_id,
                command,
                worker_id,
                ..
            } => format!("Job {} started by {}: {}", job_id, worker_id, command),
            JobEvent::JobCompleted {
                job_id,
                output,
                duration_ms,
                ..
            } => {
                if output.is_empty() {
                    format!("Job {} completed in {}ms", job_id, duration_ms)
                } else {
                    format!(
                        "Job {} completed in {}ms, output: {}",
                        job_id, duration_ms, output
                    )
                }
            }
            JobEvent::JobFailed {
                job_id,
                error,
                attempts,
                max_attempts,
                retry_at,
                ..
            } => format!(
                "Job {} failed (attempt {}/{}): {}; retrying at {}",
                job_id,
                attempts,
                max_attempts,
                error,
                retry_at.to_rfc3339()
            ),
            JobEvent::JobDeadLettered {
                job_id,
                error,
                attempts,
                ..
            } => format!(
                "Job {} moved to DLQ after {} attempts: {}",
                job_id, attempts, error
            ),
            JobEvent::JobRequeued { job_id, .. } => {
                format!("Job {} moved from DLQ back to pending", job_id)
            }
            JobEvent::WorkerStarted { worker_id, .. } => format!("Worker {} started", worker_id),
            JobEvent::WorkerStopping { worker_id, .. } => {
                format!("Worker {} stopping after current job", worker_id)
            }
            JobEvent::WorkerStopped {
                worker_id,
                processed,
                ..
            } => format!(
                "Worker {} stopped gracefully after {} jobs",
                worker_id, processed
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_description_shows_attempt_budget() {
        let job_id = JobId::new();
        let event = JobEvent::JobFailed {
            job_id,
            error: "command exited with status 1".into(),
            attempts: 1,
            max_attempts: 3,
            retry_at: Utc::now(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.job_id(), Some(job_id));
        assert!(event.description().contains("(attempt 1/3)"));
    }

    #[test]
    fn worker_events_have_no_job() {
        let at = Utc::now();
        let event = JobEvent::WorkerStarted {
            worker_id: "worker-7".into(),
            timestamp: at,
        };
        assert_eq!(event.job_id(), None);
        assert_eq!(event.timestamp(), at);
        assert_eq!(event.description(), "Worker worker-7 started");
    }
}
