//! Temporary-to-real identifier mapping operations

use crate::DbPool;
use laboursync_core::{AppError, IdentifierMapping, Timestamp};
use sqlx::{Executor, Sqlite};

/// Records a mapping, replacing any previous mapping for the same temp id
pub async fn insert_mapping(pool: &DbPool, mapping: &IdentifierMapping) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO identifier_map (temp_id, aggregate_id, correlation_key, real_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&mapping.temp_id)
    .bind(&mapping.aggregate_id)
    .bind(&mapping.correlation_key)
    .bind(&mapping.real_id)
    .bind(mapping.created_at.as_millis())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to record identifier mapping", e))?;

    Ok(())
}

/// Gets the mapping for a temp id
pub async fn find_by_temp_id(
    pool: &DbPool,
    temp_id: &str,
) -> Result<Option<IdentifierMapping>, AppError> {
    let row = sqlx::query(
        "SELECT temp_id, aggregate_id, correlation_key, real_id, created_at FROM identifier_map WHERE temp_id = ?",
    )
    .bind(temp_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch identifier mapping", e))?;

    row.map(row_to_mapping).transpose()
}

/// Unresolved mappings of an aggregate, oldest first
pub async fn unresolved_for_aggregate<'e, E>(
    executor: E,
    aggregate_id: &str,
) -> Result<Vec<IdentifierMapping>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT temp_id, aggregate_id, correlation_key, real_id, created_at
        FROM identifier_map
        WHERE aggregate_id = ? AND real_id IS NULL
        ORDER BY created_at, temp_id
        "#,
    )
    .bind(aggregate_id)
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to get unresolved mappings", e))?;

    rows.into_iter().map(row_to_mapping).collect()
}

/// Every mapping of an aggregate
pub async fn mappings_for_aggregate(
    pool: &DbPool,
    aggregate_id: &str,
) -> Result<Vec<IdentifierMapping>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT temp_id, aggregate_id, correlation_key, real_id, created_at
        FROM identifier_map
        WHERE aggregate_id = ?
        ORDER BY created_at, temp_id
        "#,
    )
    .bind(aggregate_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get mappings", e))?;

    rows.into_iter().map(row_to_mapping).collect()
}

/// Stores the server id for a temp id
pub async fn set_real_id<'e, E>(executor: E, temp_id: &str, real_id: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE identifier_map SET real_id = ? WHERE temp_id = ?")
        .bind(real_id)
        .bind(temp_id)
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to resolve identifier", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("IdentifierMapping", temp_id));
    }

    Ok(())
}

/// Deletes every mapping of an aggregate
pub async fn delete_for_aggregate<'e, E>(executor: E, aggregate_id: &str) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM identifier_map WHERE aggregate_id = ?")
        .bind(aggregate_id)
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to delete mappings", e))?;

    Ok(result.rows_affected())
}

fn row_to_mapping(row: sqlx::sqlite::SqliteRow) -> Result<IdentifierMapping, AppError> {
    use sqlx::Row;

    let created_at: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;

    Ok(IdentifierMapping {
        temp_id: row
            .try_get("temp_id")
            .map_err(|e| AppError::database("Missing temp ID", e))?,
        aggregate_id: row
            .try_get("aggregate_id")
            .map_err(|e| AppError::database("Missing aggregate ID", e))?,
        correlation_key: row
            .try_get("correlation_key")
            .map_err(|e| AppError::database("Missing correlation key", e))?,
        real_id: row.try_get("real_id").ok().flatten(),
        created_at: Timestamp::from_millis(created_at),
    })
}
