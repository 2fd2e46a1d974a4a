//! Notifier's "recent" list + ack index (spec.md §4.6). Bounded to the last
//! `N=200` by trimming on insert rather than relying on an unbounded table.

use anyhow::{Context, Result};
use qf_wire::Event;
use sqlx::PgPool;
use uuid::Uuid;

const RECENT_CAP: i64 = 200;

pub async fn record(pool: &PgPool, event: &Event) -> Result<i64> {
    let payload = serde_json::to_value(event).context("serialize event")?;
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO notify_recent (request_id, trace_id, event) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(event.request_id)
    .bind(event.trace_id)
    .bind(payload)
    .fetch_one(pool)
    .await
    .context("record notify event")?;

    sqlx::query(
        "DELETE FROM notify_recent WHERE id NOT IN ( \
           SELECT id FROM notify_recent ORDER BY created_at DESC LIMIT $1 \
         )",
    )
    .bind(RECENT_CAP)
    .execute(pool)
    .await
    .context("trim notify_recent")?;

    Ok(row.0)
}

pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Event>> {
    let rows: Vec<(serde_json::Value,)> = sqlx::query_as(
        "SELECT event FROM notify_recent ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit.min(RECENT_CAP))
    .fetch_all(pool)
    .await
    .context("list notify_recent")?;

    rows.into_iter()
        .map(|(e,)| serde_json::from_value(e).context("deserialize notify event"))
        .collect()
}

/// Ack by `requestId` or `traceId`. Returns the number of rows acked.
pub async fn ack(pool: &PgPool, request_id: Option<Uuid>, trace_id: Option<Uuid>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE notify_recent SET acked = true \
         WHERE ($1::uuid IS NOT NULL AND request_id = $1) \
            OR ($2::uuid IS NOT NULL AND trace_id = $2)",
    )
    .bind(request_id)
    .bind(trace_id)
    .execute(pool)
    .await
    .context("ack notify events")?;
    Ok(result.rows_affected())
}
