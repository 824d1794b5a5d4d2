//! Repository implementations for database operations.

mod config_repo;
mod job_repo;

pub use config_repo::{ConfigEntry, ConfigRepository};
pub use job_repo::{JobRepository, JobUpdate};
