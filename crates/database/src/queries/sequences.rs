//! Per-aggregate sequence counters

use crate::DbPool;
use laboursync_core::AppError;
use sqlx::{Executor, Sqlite};
use std::collections::HashSet;

/// Increments the counter for an aggregate and returns the new value
///
/// Creates the counter on first use. The read and the increment happen in a
/// single statement, so concurrent callers never observe the same value.
pub async fn next_sequence<'e, E>(executor: E, aggregate_id: &str) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        INSERT INTO sequences (aggregate_id, sequence) VALUES (?, 1)
        ON CONFLICT(aggregate_id) DO UPDATE SET sequence = sequence + 1
        RETURNING sequence
        "#,
    )
    .bind(aggregate_id)
    .fetch_one(executor)
    .await
    .map_err(|e| AppError::database("Failed to allocate sequence number", e))
}

/// Returns the last issued sequence for an aggregate, or 0 if none was issued
pub async fn current_sequence(pool: &DbPool, aggregate_id: &str) -> Result<i64, AppError> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT sequence FROM sequences WHERE aggregate_id = ?")
            .bind(aggregate_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::database("Failed to read sequence", e))?;

    Ok(current.unwrap_or(0))
}

/// Overrides the counter for an aggregate
pub async fn set_sequence(pool: &DbPool, aggregate_id: &str, sequence: i64) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO sequences (aggregate_id, sequence) VALUES (?, ?)
        ON CONFLICT(aggregate_id) DO UPDATE SET sequence = excluded.sequence
        "#,
    )
    .bind(aggregate_id)
    .bind(sequence)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to set sequence", e))?;

    Ok(())
}

/// Deletes the counter for an aggregate, so numbering restarts at 1
pub async fn delete_sequence<'e, E>(executor: E, aggregate_id: &str) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM sequences WHERE aggregate_id = ?")
        .bind(aggregate_id)
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to delete sequence", e))?;

    Ok(result.rows_affected())
}

/// Lists every aggregate that has a counter
pub async fn list_aggregates(pool: &DbPool) -> Result<Vec<String>, AppError> {
    sqlx::query_scalar("SELECT aggregate_id FROM sequences ORDER BY aggregate_id")
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list sequences", e))
}

/// Deletes every counter whose aggregate is not in `live`
pub async fn delete_sequences_except(pool: &DbPool, live: &HashSet<String>) -> Result<u64, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin sequence cleanup", e))?;

    let existing: Vec<String> = sqlx::query_scalar("SELECT aggregate_id FROM sequences")
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to list sequences", e))?;

    let mut removed = 0;
    for aggregate_id in existing.iter().filter(|id| !live.contains(*id)) {
        removed += delete_sequence(&mut *tx, aggregate_id).await?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit sequence cleanup", e))?;

    Ok(removed)
}
