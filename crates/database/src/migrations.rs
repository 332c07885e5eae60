//! Database migrations

use crate::DbPool;
use laboursync_core::AppError;

/// Migration 001: outbox, sequences, identifier map, guest profiles
const MIGRATION_001: &str = include_str!("../migrations/001_sync_core.sql");

/// Current database schema version
pub const CURRENT_VERSION: i64 = 1;

/// Returns the current migration version
pub fn current_version() -> i64 {
    CURRENT_VERSION
}

/// Runs all pending migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create migrations table", e))?;

    run_migration(pool, 1, MIGRATION_001).await?;

    Ok(())
}

/// Runs a single migration if not already applied
async fn run_migration(pool: &DbPool, version: i64, sql: &str) -> Result<(), AppError> {
    let applied: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_migrations WHERE version = ?")
            .bind(version)
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::database("Failed to check migration status", e))?;

    if applied.is_some() {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin migration", e))?;

    sqlx::raw_sql(sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::MigrationFailed {
            version: version.to_string(),
            reason: e.to_string(),
        })?;

    sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
        .bind(version)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to record migration", e))?;

    tx.commit()
        .await
        .map_err(|e| AppError::database(format!("Failed to commit migration {}", version), e))?;

    log::info!("Applied database migration {}", version);
    Ok(())
}

/// Verifies database integrity
pub async fn verify_integrity(pool: &DbPool) -> Result<(), AppError> {
    let result: String = sqlx::query_scalar("PRAGMA integrity_check")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to check integrity", e))?;

    if result != "ok" {
        return Err(AppError::DatabaseCorrupted { details: result });
    }

    Ok(())
}

/// Optimizes the database
pub async fn optimize(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query("PRAGMA optimize")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to optimize database", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_in_memory;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let versions: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
                .fetch_all(&pool)
                .await
                .unwrap();

        assert_eq!(versions, vec![CURRENT_VERSION]);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_all_collections_exist() {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();

        for table in ["outbox", "sequences", "identifier_map", "guest_profiles"] {
            let found: Option<String> = sqlx::query_scalar(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_optional(&pool)
            .await
            .unwrap();
            assert_eq!(found.as_deref(), Some(table));
        }
    }

    #[tokio::test]
    async fn test_verify_integrity() {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();

        verify_integrity(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_optimize() {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();

        optimize(&pool).await.unwrap();
    }
}
