//! Outbox event database operations

use crate::queries::sequences::next_sequence;
use crate::DbPool;
use laboursync_core::{
    AppError, EventId, EventStatus, EventType, OutboxEvent, OutboxStats, Timestamp,
};
use sqlx::{Executor, Sqlite};

const EVENT_COLUMNS: &str = "id, aggregate_id, aggregate_type, event_type, sequence, payload, \
     status, created_at, retry_count, is_guest_event, last_error";

/// Allocates the next sequence and inserts a pending event in one transaction
pub async fn append_event(
    pool: &DbPool,
    aggregate_id: &str,
    event_type: EventType,
    payload: serde_json::Value,
    is_guest_event: bool,
) -> Result<OutboxEvent, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin append", e))?;

    let sequence = next_sequence(&mut *tx, aggregate_id).await?;
    let event = OutboxEvent::new(aggregate_id, event_type, sequence, payload, is_guest_event);
    insert_event(&mut *tx, &event).await?;

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit appended event", e))?;

    Ok(event)
}

/// Inserts an event row as-is
pub async fn insert_event<'e, E>(executor: E, event: &OutboxEvent) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let payload = serde_json::to_string(&event.payload)
        .map_err(|e| AppError::invalid_data("OutboxEvent", e))?;

    sqlx::query(
        r#"
        INSERT INTO outbox (id, aggregate_id, aggregate_type, event_type, sequence, payload,
                            status, created_at, retry_count, is_guest_event, last_error)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.as_string())
    .bind(&event.aggregate_id)
    .bind(&event.aggregate_type)
    .bind(&event.event_type)
    .bind(event.sequence)
    .bind(payload)
    .bind(event.status.as_str())
    .bind(event.created_at.as_millis())
    .bind(i64::from(event.retry_count))
    .bind(event.is_guest_event)
    .bind(&event.last_error)
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to insert outbox event", e))?;

    Ok(())
}

/// Gets an event by ID
pub async fn get_event(pool: &DbPool, id: EventId) -> Result<Option<OutboxEvent>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM outbox WHERE id = ?", EVENT_COLUMNS))
        .bind(id.as_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch outbox event", e))?;

    row.map(row_to_event).transpose()
}

/// Pending events of one aggregate in replay order
pub async fn pending_for_aggregate(
    pool: &DbPool,
    aggregate_id: &str,
) -> Result<Vec<OutboxEvent>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM outbox WHERE aggregate_id = ? AND status = 'pending' ORDER BY sequence",
        EVENT_COLUMNS
    ))
    .bind(aggregate_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get pending events", e))?;

    rows.into_iter().map(row_to_event).collect()
}

/// Events of one aggregate that are not yet synced, in sequence order
///
/// A drain walks this list so that a failed or in-flight event blocks every
/// later event of the aggregate.
pub async fn unsettled_for_aggregate(
    pool: &DbPool,
    aggregate_id: &str,
) -> Result<Vec<OutboxEvent>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM outbox WHERE aggregate_id = ? AND status != 'synced' ORDER BY sequence",
        EVENT_COLUMNS
    ))
    .bind(aggregate_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get unsettled events", e))?;

    rows.into_iter().map(row_to_event).collect()
}

/// Pending events across all aggregates, oldest first
pub async fn all_pending(pool: &DbPool) -> Result<Vec<OutboxEvent>, AppError> {
    events_by_status(pool, EventStatus::Pending).await
}

/// Aggregates holding at least one pending non-guest event
pub async fn pending_aggregate_ids(pool: &DbPool) -> Result<Vec<String>, AppError> {
    sqlx::query_scalar(
        r#"
        SELECT DISTINCT aggregate_id FROM outbox
        WHERE status = 'pending' AND is_guest_event = 0
        ORDER BY aggregate_id
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list pending aggregates", e))
}

/// Every event of one aggregate, any status, in sequence order
pub async fn events_for_aggregate(
    pool: &DbPool,
    aggregate_id: &str,
) -> Result<Vec<OutboxEvent>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM outbox WHERE aggregate_id = ? ORDER BY sequence",
        EVENT_COLUMNS
    ))
    .bind(aggregate_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get aggregate events", e))?;

    rows.into_iter().map(row_to_event).collect()
}

/// Events with the given status, oldest first
pub async fn events_by_status(
    pool: &DbPool,
    status: EventStatus,
) -> Result<Vec<OutboxEvent>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM outbox WHERE status = ? ORDER BY created_at, id",
        EVENT_COLUMNS
    ))
    .bind(status.as_str())
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get events by status", e))?;

    rows.into_iter().map(row_to_event).collect()
}

/// Events still flagged as guest events
pub async fn guest_events(pool: &DbPool) -> Result<Vec<OutboxEvent>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM outbox WHERE is_guest_event = 1 ORDER BY aggregate_id, sequence",
        EVENT_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get guest events", e))?;

    rows.into_iter().map(row_to_event).collect()
}

/// Failed events that have been retried fewer than `max_retries` times
pub async fn retriable_events(pool: &DbPool, max_retries: u32) -> Result<Vec<OutboxEvent>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM outbox WHERE status = 'failed' AND retry_count < ? ORDER BY created_at, id",
        EVENT_COLUMNS
    ))
    .bind(i64::from(max_retries))
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get retriable events", e))?;

    rows.into_iter().map(row_to_event).collect()
}

/// Sets the status of an event, clearing the last error unless the new status is `failed`
pub async fn set_status(pool: &DbPool, id: EventId, status: EventStatus) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE outbox
        SET status = ?, last_error = CASE WHEN ? = 'failed' THEN last_error ELSE NULL END
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(status.as_str())
    .bind(id.as_string())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to update event status", e))?;

    expect_one(result.rows_affected(), id)
}

/// Marks an event failed, recording the error and incrementing its retry count
pub async fn mark_failed(pool: &DbPool, id: EventId, error: &str) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE outbox SET status = 'failed', retry_count = retry_count + 1, last_error = ? WHERE id = ?",
    )
    .bind(error)
    .bind(id.as_string())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to mark event failed", e))?;

    expect_one(result.rows_affected(), id)
}

/// Completes an event: non-guest rows are deleted, guest rows are kept as `synced`
///
/// Returns true if the row was deleted.
pub async fn complete_event(pool: &DbPool, id: EventId) -> Result<bool, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin completion", e))?;

    let deleted = sqlx::query("DELETE FROM outbox WHERE id = ? AND is_guest_event = 0")
        .bind(id.as_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to delete synced event", e))?
        .rows_affected();

    let kept = sqlx::query(
        "UPDATE outbox SET status = 'synced', last_error = NULL WHERE id = ? AND is_guest_event = 1",
    )
    .bind(id.as_string())
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::database("Failed to mark guest event synced", e))?
    .rows_affected();

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit completion", e))?;

    expect_one(deleted + kept, id)?;
    Ok(deleted == 1)
}

/// Clears the guest flag on the given events
pub async fn clear_guest_flag(pool: &DbPool, ids: &[EventId]) -> Result<u64, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin guest upgrade", e))?;

    let mut updated = 0;
    for id in ids {
        updated += sqlx::query("UPDATE outbox SET is_guest_event = 0 WHERE id = ?")
            .bind(id.as_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database("Failed to clear guest flag", e))?
            .rows_affected();
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit guest upgrade", e))?;

    Ok(updated)
}

/// Clears the guest flag on every event of an aggregate
pub async fn clear_guest_flag_for_aggregate<'e, E>(
    executor: E,
    aggregate_id: &str,
) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE outbox SET is_guest_event = 0 WHERE aggregate_id = ? AND is_guest_event = 1",
    )
    .bind(aggregate_id)
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to clear guest flags", e))?;

    Ok(result.rows_affected())
}

/// Deletes synced, non-guest events
pub async fn prune_synced(pool: &DbPool) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM outbox WHERE status = 'synced' AND is_guest_event = 0")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to prune synced events", e))?;

    Ok(result.rows_affected())
}

/// Returns events left in `syncing` by an interrupted run to `pending`
pub async fn reset_syncing(pool: &DbPool) -> Result<u64, AppError> {
    let result = sqlx::query("UPDATE outbox SET status = 'pending' WHERE status = 'syncing'")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to recover syncing events", e))?;

    Ok(result.rows_affected())
}

/// Deletes every event of an aggregate
pub async fn delete_for_aggregate<'e, E>(executor: E, aggregate_id: &str) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM outbox WHERE aggregate_id = ?")
        .bind(aggregate_id)
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to delete aggregate events", e))?;

    Ok(result.rows_affected())
}

/// Aggregates that still have rows in the outbox
pub async fn aggregate_ids(pool: &DbPool) -> Result<Vec<String>, AppError> {
    sqlx::query_scalar("SELECT DISTINCT aggregate_id FROM outbox ORDER BY aggregate_id")
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list outbox aggregates", e))
}

/// Counts events by status
pub async fn stats(pool: &DbPool) -> Result<OutboxStats, AppError> {
    let counts: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM outbox GROUP BY status")
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::database("Failed to count events", e))?;

    let guest: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE is_guest_event = 1")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count guest events", e))?;

    let mut stats = OutboxStats {
        guest: guest as usize,
        ..Default::default()
    };
    for (status, count) in counts {
        let count = count as usize;
        match status.parse::<EventStatus>() {
            Ok(EventStatus::Pending) => stats.pending = count,
            Ok(EventStatus::Syncing) => stats.syncing = count,
            Ok(EventStatus::Synced) => stats.synced = count,
            Ok(EventStatus::Failed) => stats.failed = count,
            Err(reason) => log::warn!("Ignoring outbox rows with bad status: {}", reason),
        }
    }

    Ok(stats)
}

fn expect_one(rows: u64, id: EventId) -> Result<(), AppError> {
    if rows == 0 {
        Err(AppError::not_found("OutboxEvent", id.to_string()))
    } else {
        Ok(())
    }
}

pub(crate) fn row_to_event(row: sqlx::sqlite::SqliteRow) -> Result<OutboxEvent, AppError> {
    use sqlx::Row;

    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing event ID", e))?;
    let id = EventId::from_string(&id_str).map_err(|e| AppError::database("Invalid event ID", e))?;

    let payload_str: String = row
        .try_get("payload")
        .map_err(|e| AppError::database("Missing payload", e))?;
    let payload = serde_json::from_str(&payload_str)
        .map_err(|e| AppError::invalid_data(format!("OutboxEvent {}", id), e))?;

    let status_str: String = row
        .try_get("status")
        .map_err(|e| AppError::database("Missing status", e))?;
    let status = status_str
        .parse::<EventStatus>()
        .map_err(|reason| AppError::invalid_data(format!("OutboxEvent {}", id), reason))?;

    let created_at_ms: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;
    let retry_count: i64 = row
        .try_get("retry_count")
        .map_err(|e| AppError::database("Missing retry_count", e))?;

    Ok(OutboxEvent {
        id,
        aggregate_id: row
            .try_get("aggregate_id")
            .map_err(|e| AppError::database("Missing aggregate ID", e))?,
        aggregate_type: row
            .try_get("aggregate_type")
            .map_err(|e| AppError::database("Missing aggregate type", e))?,
        event_type: row
            .try_get("event_type")
            .map_err(|e| AppError::database("Missing event type", e))?,
        sequence: row
            .try_get("sequence")
            .map_err(|e| AppError::database("Missing sequence", e))?,
        payload,
        status,
        created_at: Timestamp::from_millis(created_at_ms),
        retry_count: retry_count.clamp(0, i64::from(u32::MAX)) as u32,
        is_guest_event: row
            .try_get("is_guest_event")
            .map_err(|e| AppError::database("Missing guest flag", e))?,
        last_error: row.try_get("last_error").ok().flatten(),
    })
}
