//! laboursync Database Layer
//!
//! Durable local store for the sync core: the outbox, per-aggregate sequence
//! counters, the identifier map and guest profiles. Uses SQLite through sqlx.

pub mod connection;
pub mod migrations;
pub mod queries;

pub use connection::{close, connect, connect_in_memory, DatabaseConfig, DbPool};
pub use migrations::{current_version, optimize, run_migrations, verify_integrity};

/// Opens a database and brings its schema up to date
pub async fn open(config: DatabaseConfig) -> Result<DbPool, laboursync_core::AppError> {
    let pool = connect(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Opens a migrated in-memory database
pub async fn open_in_memory() -> Result<DbPool, laboursync_core::AppError> {
    let pool = connect_in_memory().await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
