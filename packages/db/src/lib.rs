//! SQLite persistence for the job queue system.
//!
//! This crate provides the store handle and repositories for persisting
//! jobs and configuration. The atomic claim in
//! [`repositories::JobRepository::claim_next`] is the only synchronisation
//! between worker processes.

mod connection;
pub mod repositories;
mod schema;

pub use connection::{Database, DbConfig, DbError, DbLocation};
pub use schema::init_schema;

/// Open the database and make sure the schema exists.
///
/// This should be called once by each process entry point.
pub async fn init(config: DbConfig) -> Result<Database, DbError> {
    let db = Database::connect(&config).await?;
    init_schema(&db).await?;
    Ok(db)
}
