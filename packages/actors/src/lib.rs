//! Job execution and worker management.
//!
//! # Architecture
//!
//! - [`QueueEngine`] - Runs commands and applies the retry/dead-letter policy
//! - [`WorkerActor`] - Claim/execute/record loop, one per worker process
//! - [`WorkerSupervisor`] - Spawns, lists and stops worker processes
//!
//! # Usage
//!
//! ```ignore
//! use actors::{QueueEngine, WorkerArgs, WorkerMessage, start_worker};
//!
//! let engine = Arc::new(QueueEngine::new(jobs, config));
//! let (worker, handle) = start_worker(WorkerArgs::new("worker-1", engine)).await?;
//!
//! // Finish the current job, then exit
//! worker.send_message(WorkerMessage::Shutdown)?;
//! handle.await?;
//! ```

mod engine;
mod executor;
mod messages;
mod persistence;
pub mod process;
mod supervisor;
mod worker_actor;

pub use engine::{EngineError, JobOutcome, MAX_BACKOFF, QueueEngine, backoff_delay};
pub use executor::{CommandExecutor, DEFAULT_TIMEOUT, ExecutionFuture, FnExecutor, ShellExecutor};
pub use messages::WorkerMessage;
pub use persistence::{PersistenceError, ROSTER_FILE, RosterStore, WorkerRecord};
pub use supervisor::{StopOutcome, SupervisorError, WorkerCommand, WorkerSupervisor};
pub use worker_actor::{DEFAULT_POLL_INTERVAL, WorkerActor, WorkerArgs, start_worker};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
