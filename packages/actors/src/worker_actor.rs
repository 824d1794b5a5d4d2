//! Worker actor: the claim/execute/record loop run by each worker process.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use queue_core::JobEvent;
use ractor::concurrency::JoinHandle;
use ractor::{Actor, ActorProcessingErr, ActorRef, SpawnErr};

use crate::engine::{EngineError, QueueEngine};
use crate::messages::WorkerMessage;

/// Pause between polls when there is nothing to claim.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// State for the worker actor.
pub struct WorkerActorState {
    /// Identity written into `locked_by`.
    pub worker_id: String,
    pub engine: Arc<QueueEngine>,
    pub poll_interval: Duration,
    /// Cleared once a shutdown has been requested.
    pub running: bool,
    /// Jobs whose outcome was recorded.
    pub processed: u64,
}

impl WorkerActorState {
    /// Claim one job and see it through. Returns whether a job was claimed.
    async fn work_once(&mut self) -> Result<bool, EngineError> {
        let Some(job) = self.engine.claim(&self.worker_id).await? else {
            return Ok(false);
        };

        let outcome = self.engine.process(&job).await;
        self.engine.record(&job, &outcome).await?;
        self.processed += 1;
        Ok(true)
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub engine: Arc<QueueEngine>,
    pub poll_interval: Duration,
}

impl WorkerArgs {
    pub fn new(worker_id: impl Into<String>, engine: Arc<QueueEngine>) -> Self {
        Self {
            worker_id: worker_id.into(),
            engine,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Worker actor that claims and executes jobs.
///
/// The actor handles one message at a time, so a [`WorkerMessage::Shutdown`]
/// that arrives while a job runs is only seen once that job is recorded.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "{}",
            JobEvent::WorkerStarted {
                worker_id: args.worker_id.clone(),
                timestamp: Utc::now(),
            }
            .description()
        );

        myself.send_message(WorkerMessage::Poll)?;

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            engine: args.engine,
            poll_interval: args.poll_interval,
            running: true,
            processed: 0,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            "{}",
            JobEvent::WorkerStopped {
                worker_id: state.worker_id.clone(),
                processed: state.processed,
                timestamp: Utc::now(),
            }
            .description()
        );
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                if !state.running {
                    return Ok(());
                }

                match state.work_once().await {
                    Ok(true) => {
                        // More work may be waiting; don't sleep.
                        let _ = myself.send_message(WorkerMessage::Poll);
                    }
                    Ok(false) => {
                        myself.send_after(state.poll_interval, || WorkerMessage::Poll);
                    }
                    Err(EngineError::LockLost { job_id, worker }) => {
                        tracing::warn!(%job_id, worker, "lock lost to another worker, result discarded");
                        let _ = myself.send_message(WorkerMessage::Poll);
                    }
                    Err(e) => {
                        tracing::error!(worker_id = %state.worker_id, "poll failed: {}", e);
                        myself.send_after(state.poll_interval, || WorkerMessage::Poll);
                    }
                }
            }

            WorkerMessage::Processed { reply } => {
                let _ = reply.send(state.processed);
            }

            WorkerMessage::Shutdown => {
                tracing::info!(
                    "{}",
                    JobEvent::WorkerStopping {
                        worker_id: state.worker_id.clone(),
                        timestamp: Utc::now(),
                    }
                    .description()
                );
                state.running = false;
                myself.stop(None);
            }
        }

        Ok(())
    }
}

/// Spawn a worker actor; it starts polling immediately.
pub async fn start_worker(
    args: WorkerArgs,
) -> Result<(ActorRef<WorkerMessage>, JoinHandle<()>), SpawnErr> {
    Actor::spawn(None, WorkerActor, args).await
}
