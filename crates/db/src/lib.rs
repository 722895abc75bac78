//! PostgreSQL persistence for environments, ballots, users and promotion
//! tasks.
//!
//! Environments are stored as one row per document; the round and mining
//! payloads live in JSONB columns and the whole document is replaced under
//! an optimistic version check. Repositories speak `sqlx::Error`; the
//! [`store`] module adapts them to the core store traits.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;
pub mod store;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Cheap liveness probe for startup checks.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
