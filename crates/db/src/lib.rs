//! Persistence layer for the notification core.
//!
//! - [`store`]: the narrow async interfaces the dispatcher and worker
//!   depend on ([`PreferenceStore`], [`NotificationStore`], [`DeliveryQueue`]).
//! - [`repositories`]: PostgreSQL implementations (sqlx).
//! - [`memory`]: in-process implementations for tests and local runs.
//! - [`models`]: rows and DTOs shared by both.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{DeliveryQueue, NotificationStore, PreferenceStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the pool is usable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = sqlx::migrate!("../../db/migrations");
    migrator.run(pool).await?;
    tracing::info!(count = migrator.iter().count(), "Database migrations applied");
    Ok(())
}
