//! `RangeDLQ`/`Requeue` (spec.md §4.1, §8's "Requeue is idempotent" invariant).

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct DlqEntry {
    pub id: i64,
    pub original_stream: String,
    pub payload: Value,
    pub failures: i32,
    pub last_error: Option<String>,
}

pub async fn range(
    pool: &PgPool,
    dlq_stream: &str,
    from: i64,
    to: i64,
    limit: i64,
) -> Result<Vec<DlqEntry>> {
    let rows: Vec<(i64, Value, String, i32, Option<String>)> = sqlx::query_as(
        "SELECT se.entry_id, se.payload, m.original_stream, m.failures, m.last_error \
         FROM stream_entries se \
         JOIN stream_dlq_meta m ON m.dlq_stream = se.stream AND m.entry_id = se.entry_id \
         WHERE se.stream = $1 AND se.entry_id >= $2 AND se.entry_id <= $3 \
         ORDER BY se.entry_id \
         LIMIT $4",
    )
    .bind(dlq_stream)
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("range dlq")?;

    Ok(rows
        .into_iter()
        .map(|(id, payload, original_stream, failures, last_error)| DlqEntry {
            id,
            original_stream,
            payload,
            failures,
            last_error,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequeueOutcome {
    Requeued { new_entry_id: i64 },
    NotFound,
}

/// Re-append the original payload onto its original stream with a fresh id,
/// then remove the DLQ entry. Idempotent: requeueing an id that is no
/// longer present (already requeued, or never existed) returns `NotFound`
/// rather than erroring, so a caller's retry is a safe no-op (spec.md §8).
pub async fn requeue(pool: &PgPool, dlq_stream: &str, id: i64) -> Result<RequeueOutcome> {
    let mut tx = pool.begin().await?;

    let row: Option<(Value, String)> = sqlx::query_as(
        "SELECT se.payload, m.original_stream \
         FROM stream_entries se \
         JOIN stream_dlq_meta m ON m.dlq_stream = se.stream AND m.entry_id = se.entry_id \
         WHERE se.stream = $1 AND se.entry_id = $2 \
         FOR UPDATE OF se",
    )
    .bind(dlq_stream)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .context("lookup dlq entry")?;

    let Some((payload, original_stream)) = row else {
        tx.commit().await?;
        return Ok(RequeueOutcome::NotFound);
    };

    let new_id: (i64,) = sqlx::query_as(
        "INSERT INTO stream_entries (stream, payload) VALUES ($1, $2) RETURNING entry_id",
    )
    .bind(&original_stream)
    .bind(&payload)
    .fetch_one(&mut *tx)
    .await
    .context("append requeued entry")?;

    sqlx::query("DELETE FROM stream_dlq_meta WHERE dlq_stream = $1 AND entry_id = $2")
        .bind(dlq_stream)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete dlq metadata")?;

    sqlx::query("DELETE FROM stream_entries WHERE stream = $1 AND entry_id = $2")
        .bind(dlq_stream)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete dlq entry")?;

    tx.commit().await?;

    Ok(RequeueOutcome::Requeued {
        new_entry_id: new_id.0,
    })
}
