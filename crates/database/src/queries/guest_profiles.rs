//! Guest profile database operations

use crate::DbPool;
use laboursync_core::{AppError, GuestProfile, Timestamp};
use sqlx::{Executor, Sqlite};

const PROFILE_COLUMNS: &str = "guest_id, created_at, entities, is_upgraded, last_active_at";

/// Inserts a new guest profile
pub async fn insert_profile(pool: &DbPool, profile: &GuestProfile) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO guest_profiles (guest_id, created_at, entities, is_upgraded, last_active_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&profile.guest_id)
    .bind(profile.created_at.as_millis())
    .bind(encode_entities(&profile.entities)?)
    .bind(profile.is_upgraded)
    .bind(profile.last_active_at.as_millis())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create guest profile", e))?;

    Ok(())
}

/// Gets a guest profile by ID
pub async fn get_profile<'e, E>(executor: E, guest_id: &str) -> Result<Option<GuestProfile>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM guest_profiles WHERE guest_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(guest_id)
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch guest profile", e))?;

    row.map(row_to_profile).transpose()
}

/// Most recently active profile that has not been upgraded
pub async fn current_profile(pool: &DbPool) -> Result<Option<GuestProfile>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM guest_profiles WHERE is_upgraded = 0 ORDER BY last_active_at DESC LIMIT 1",
        PROFILE_COLUMNS
    ))
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch current guest profile", e))?;

    row.map(row_to_profile).transpose()
}

/// Lists every profile, newest first
pub async fn list_profiles(pool: &DbPool) -> Result<Vec<GuestProfile>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM guest_profiles ORDER BY created_at DESC",
        PROFILE_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list guest profiles", e))?;

    rows.into_iter().map(row_to_profile).collect()
}

/// Profiles not active since `cutoff`
pub async fn inactive_profiles(
    pool: &DbPool,
    cutoff: Timestamp,
) -> Result<Vec<GuestProfile>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM guest_profiles WHERE last_active_at < ? ORDER BY last_active_at",
        PROFILE_COLUMNS
    ))
    .bind(cutoff.as_millis())
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list inactive guest profiles", e))?;

    rows.into_iter().map(row_to_profile).collect()
}

/// Updates the last activity time of a profile
pub async fn update_last_active(
    pool: &DbPool,
    guest_id: &str,
    at: Timestamp,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE guest_profiles SET last_active_at = ? WHERE guest_id = ?")
        .bind(at.as_millis())
        .bind(guest_id)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to update guest activity", e))?;

    expect_one(result.rows_affected(), guest_id)
}

/// Replaces the entity list of a profile
pub async fn update_entities<'e, E>(
    executor: E,
    guest_id: &str,
    entities: &[String],
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE guest_profiles SET entities = ? WHERE guest_id = ?")
        .bind(encode_entities(entities)?)
        .bind(guest_id)
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to update guest entities", e))?;

    expect_one(result.rows_affected(), guest_id)
}

/// Flags a profile as upgraded
pub async fn mark_upgraded<'e, E>(executor: E, guest_id: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE guest_profiles SET is_upgraded = 1 WHERE guest_id = ?")
        .bind(guest_id)
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to mark guest profile upgraded", e))?;

    expect_one(result.rows_affected(), guest_id)
}

/// Deletes a profile
pub async fn delete_profile<'e, E>(executor: E, guest_id: &str) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM guest_profiles WHERE guest_id = ?")
        .bind(guest_id)
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to delete guest profile", e))?;

    Ok(result.rows_affected())
}

fn expect_one(rows: u64, guest_id: &str) -> Result<(), AppError> {
    if rows == 0 {
        Err(AppError::not_found("GuestProfile", guest_id))
    } else {
        Ok(())
    }
}

fn encode_entities(entities: &[String]) -> Result<String, AppError> {
    serde_json::to_string(entities).map_err(|e| AppError::invalid_data("GuestProfile", e))
}

fn row_to_profile(row: sqlx::sqlite::SqliteRow) -> Result<GuestProfile, AppError> {
    use sqlx::Row;

    let guest_id: String = row
        .try_get("guest_id")
        .map_err(|e| AppError::database("Missing guest ID", e))?;
    let entities: String = row
        .try_get("entities")
        .map_err(|e| AppError::database("Missing entities", e))?;
    let entities = serde_json::from_str(&entities)
        .map_err(|e| AppError::invalid_data(format!("GuestProfile {}", guest_id), e))?;
    let created_at: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;
    let last_active_at: i64 = row
        .try_get("last_active_at")
        .map_err(|e| AppError::database("Missing last_active_at", e))?;

    Ok(GuestProfile {
        guest_id,
        created_at: Timestamp::from_millis(created_at),
        entities,
        is_upgraded: row
            .try_get("is_upgraded")
            .map_err(|e| AppError::database("Missing upgrade flag", e))?,
        last_active_at: Timestamp::from_millis(last_active_at),
    })
}
