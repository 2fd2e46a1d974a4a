//! Idempotency gate (spec.md §3 "Idempotency record", §4.1 step 2).
//! Ported from `mqk-db::outbox_enqueue`'s `ON CONFLICT DO NOTHING RETURNING`
//! idempotent-insert idiom.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub async fn seen(pool: &PgPool, stream: &str, group: &str, key: &str) -> Result<bool> {
    let row: Option<(i32,)> = sqlx::query_as(
        "SELECT 1 FROM stream_idempotency \
         WHERE stream = $1 AND consumer_group = $2 AND idempotency_key = $3 AND expires_at > now()",
    )
    .bind(stream)
    .bind(group)
    .bind(key)
    .fetch_optional(pool)
    .await
    .context("idempotency lookup")?;
    Ok(row.is_some())
}

pub async fn record(
    pool: &PgPool,
    stream: &str,
    group: &str,
    key: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO stream_idempotency (stream, consumer_group, idempotency_key, expires_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (stream, consumer_group, idempotency_key) \
         DO UPDATE SET expires_at = EXCLUDED.expires_at",
    )
    .bind(stream)
    .bind(group)
    .bind(key)
    .bind(expires_at)
    .execute(pool)
    .await
    .context("record idempotency key")?;
    Ok(())
}
