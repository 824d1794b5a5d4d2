//! Core domain types for the job queue system.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobId and JobState for work items
//! - JobStats for queue summaries
//! - ExecutionResult for command outcomes
//! - QueueSettings for tunables kept in the config store
//! - Events for progress logging

mod events;
mod execution;
mod job;
pub mod settings;
mod stats;

pub use events::JobEvent;
pub use execution::{ExecutionError, ExecutionResult};
pub use job::{DEFAULT_MAX_RETRIES, Job, JobId, JobState, UnknownStateError};
pub use settings::{QueueSettings, SettingsError};
pub use stats::JobStats;
