//! Job record store implementations.
//!
//! Two backends for the [`siteaudit_core::store::JobStore`] contract:
//! [`MemoryJobStore`] for single-process deployments and tests, and
//! [`PgJobStore`] for durable storage behind PostgreSQL. The server picks
//! one at startup based on whether `DATABASE_URL` is set.

pub mod memory;
pub mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run pending migrations from the embedded `migrations/` directory.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
