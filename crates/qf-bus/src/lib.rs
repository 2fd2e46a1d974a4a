//! Durable stream runtime (C1). Generalizes `mqk-db`'s outbox/inbox tables
//! (append-once log + claim-batch via `FOR UPDATE SKIP LOCKED` + idempotent
//! insert) from a single fixed table into a named-stream model covering
//! every stream in `qf_wire::streams`.

mod dlq;
mod idempotency;

pub use dlq::{range as range_dlq, requeue, DlqEntry, RequeueOutcome};

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use futures_util::FutureExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;

/// Connect to Postgres and apply migrations, mirroring
/// `mqk_db::connect_from_env`/`migrate`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var("POSTGRES_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .context("POSTGRES_URL or DATABASE_URL must be set")?;
    connect(&url).await
}

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to postgres")?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run qf-bus migrations")?;
    Ok(())
}

/// Test helper for `tests/scenario_*.rs` across the workspace: connect using
/// `QF_DATABASE_URL` and apply every crate's migrations, mirroring
/// `mqk_db::testkit_db_pool`. Also runs `qf-kv`'s migrations so a single
/// pool covers both the stream substrate and the shared KV tables a
/// scenario test exercises together.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let url = std::env::var("QF_DATABASE_URL").context("missing env var QF_DATABASE_URL")?;
    let pool = connect(&url).await?;
    qf_kv::migrate(&pool).await.context("run qf-kv migrations")?;
    Ok(pool)
}

/// A failure kind a handler reports back to the runtime (spec.md §4.1
/// "Failure kinds"). `Transient` leaves the entry unacked for redelivery;
/// `Permanent` counts toward the DLQ threshold immediately.
#[derive(Debug, Clone)]
pub enum HandlerError {
    Transient(String),
    Permanent(String),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::Transient(m) => write!(f, "transient: {m}"),
            HandlerError::Permanent(m) => write!(f, "permanent: {m}"),
        }
    }
}

impl std::error::Error for HandlerError {}

/// `Consume` options (spec.md §4.1's `opts` record).
pub struct ConsumeOpts<F>
where
    F: Fn(&Value) -> String + Send + Sync + 'static,
{
    pub block_ms: u64,
    pub batch_size: i64,
    pub idempotency_key_fn: F,
    pub idempotency_ttl: ChronoDuration,
    pub max_failures: i32,
}

/// Atomic append; returns the assigned monotonically increasing `entry_id`.
pub async fn append(pool: &PgPool, stream: &str, payload: &Value) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO stream_entries (stream, payload) VALUES ($1, $2) RETURNING entry_id",
    )
    .bind(stream)
    .bind(payload)
    .fetch_one(pool)
    .await
    .context("append stream entry")?;
    Ok(row.0)
}

/// Number of delivered-but-unacked entries for `(stream, group)`.
pub async fn pending_count(pool: &PgPool, stream: &str, group: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT count(*) FROM stream_delivery \
         WHERE stream = $1 AND consumer_group = $2 AND acked_at IS NULL",
    )
    .bind(stream)
    .bind(group)
    .fetch_one(pool)
    .await
    .context("pending_count")?;
    Ok(row.0)
}

struct ClaimedEntry {
    entry_id: i64,
    payload: Value,
    failures: i32,
}

/// Ensure every not-yet-seen entry for this group has a pending delivery
/// row, then claim up to `batch_size` unacked rows via
/// `FOR UPDATE SKIP LOCKED` (the teacher's `outbox_claim_batch` pattern).
async fn claim_batch(
    pool: &PgPool,
    stream: &str,
    group: &str,
    consumer_id: &str,
    batch_size: i64,
) -> Result<Vec<ClaimedEntry>> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO stream_delivery (stream, consumer_group, entry_id) \
         SELECT se.stream, $2, se.entry_id FROM stream_entries se \
         WHERE se.stream = $1 \
           AND NOT EXISTS ( \
             SELECT 1 FROM stream_delivery sd \
             WHERE sd.stream = se.stream AND sd.consumer_group = $2 AND sd.entry_id = se.entry_id \
           ) \
         ON CONFLICT DO NOTHING",
    )
    .bind(stream)
    .bind(group)
    .execute(&mut *tx)
    .await
    .context("seed stream_delivery")?;

    let claimed_ids: Vec<(i64,)> = sqlx::query_as(
        "WITH to_claim AS ( \
           SELECT entry_id FROM stream_delivery \
           WHERE stream = $1 AND consumer_group = $2 AND acked_at IS NULL \
           ORDER BY entry_id \
           FOR UPDATE SKIP LOCKED \
           LIMIT $3 \
         ) \
         UPDATE stream_delivery sd SET claimed_by = $4, claimed_at = now() \
         FROM to_claim tc \
         WHERE sd.stream = $1 AND sd.consumer_group = $2 AND sd.entry_id = tc.entry_id \
         RETURNING sd.entry_id",
    )
    .bind(stream)
    .bind(group)
    .bind(batch_size)
    .bind(consumer_id)
    .fetch_all(&mut *tx)
    .await
    .context("claim stream_delivery batch")?;

    if claimed_ids.is_empty() {
        tx.commit().await?;
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = claimed_ids.iter().map(|(id,)| *id).collect();
    let rows: Vec<(i64, Value, i32)> = sqlx::query_as(
        "SELECT se.entry_id, se.payload, sd.failures \
         FROM stream_entries se \
         JOIN stream_delivery sd ON sd.stream = se.stream AND sd.entry_id = se.entry_id \
         WHERE se.stream = $1 AND sd.consumer_group = $2 AND se.entry_id = ANY($3)",
    )
    .bind(stream)
    .bind(group)
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await
    .context("fetch claimed payloads")?;

    tx.commit().await?;

    Ok(rows
        .into_iter()
        .map(|(entry_id, payload, failures)| ClaimedEntry {
            entry_id,
            payload,
            failures,
        })
        .collect())
}

async fn ack(pool: &PgPool, stream: &str, group: &str, entry_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE stream_delivery SET acked_at = now(), claimed_by = NULL \
         WHERE stream = $1 AND consumer_group = $2 AND entry_id = $3",
    )
    .bind(stream)
    .bind(group)
    .bind(entry_id)
    .execute(pool)
    .await
    .context("ack entry")?;
    Ok(())
}

async fn release_unacked(
    pool: &PgPool,
    stream: &str,
    group: &str,
    entry_id: i64,
    error: &str,
) -> Result<i32> {
    let row: (i32,) = sqlx::query_as(
        "UPDATE stream_delivery SET failures = failures + 1, claimed_by = NULL, last_error = $4 \
         WHERE stream = $1 AND consumer_group = $2 AND entry_id = $3 \
         RETURNING failures",
    )
    .bind(stream)
    .bind(group)
    .bind(entry_id)
    .bind(error)
    .fetch_one(pool)
    .await
    .context("record handler failure")?;
    Ok(row.0)
}

/// Release a transient failure without touching the DLQ-threshold counter
/// (spec.md §4.1: "transient (network/KV) → leave unacked"). The entry
/// stays unacked and is redelivered on the next `claim_batch`; only
/// `Permanent`/poison failures count toward `max_failures`.
async fn release_unacked_transient(
    pool: &PgPool,
    stream: &str,
    group: &str,
    entry_id: i64,
    error: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE stream_delivery SET claimed_by = NULL, last_error = $4 \
         WHERE stream = $1 AND consumer_group = $2 AND entry_id = $3",
    )
    .bind(stream)
    .bind(group)
    .bind(entry_id)
    .bind(error)
    .execute(pool)
    .await
    .context("record transient handler failure")?;
    Ok(())
}

async fn send_to_dlq(
    pool: &PgPool,
    original_stream: &str,
    dlq_stream: &str,
    payload: &Value,
    failures: i32,
    last_error: &str,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO stream_entries (stream, payload) VALUES ($1, $2) RETURNING entry_id",
    )
    .bind(dlq_stream)
    .bind(payload)
    .fetch_one(&mut *tx)
    .await
    .context("append dlq entry")?;

    sqlx::query(
        "INSERT INTO stream_dlq_meta (dlq_stream, entry_id, original_stream, failures, last_error) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(dlq_stream)
    .bind(row.0)
    .bind(original_stream)
    .bind(failures)
    .bind(last_error)
    .execute(&mut *tx)
    .await
    .context("record dlq metadata")?;

    tx.commit().await?;
    Ok(())
}

async fn idempotency_seen(
    pool: &PgPool,
    stream: &str,
    group: &str,
    key: &str,
) -> Result<bool> {
    idempotency::seen(pool, stream, group, key).await
}

async fn idempotency_record(
    pool: &PgPool,
    stream: &str,
    group: &str,
    key: &str,
    ttl: ChronoDuration,
) -> Result<()> {
    idempotency::record(pool, stream, group, key, Utc::now() + ttl).await
}

/// Long-running consume loop for `(stream, group)`. Drives the delivery
/// contract of spec.md §4.1 steps 1-4. `shutdown` is a watch channel that
/// flips to `true` to request a graceful stop; in-flight handler calls are
/// always allowed to finish before the loop exits.
pub async fn consume<F, Fut, K>(
    pool: PgPool,
    stream: String,
    group: String,
    consumer_id: String,
    opts: ConsumeOpts<K>,
    handler: F,
    mut shutdown: watch::Receiver<bool>,
) where
    F: Fn(i64, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
    K: Fn(&Value) -> String + Send + Sync + 'static,
{
    let dlq_stream = qf_wire::streams::dlq_name(&stream);
    let mut ticker = tokio::time::interval(Duration::from_millis(opts.block_ms.max(50)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!(stream = %stream, group = %group, "consumer shutting down");
                    return;
                }
            }
        }

        if *shutdown.borrow() {
            return;
        }

        let batch = match claim_batch(&pool, &stream, &group, &consumer_id, opts.batch_size).await
        {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(stream = %stream, error = %e, "claim_batch failed");
                continue;
            }
        };

        for entry in batch {
            let key = (opts.idempotency_key_fn)(&entry.payload);

            match idempotency_seen(&pool, &stream, &group, &key).await {
                Ok(true) => {
                    let _ = ack(&pool, &stream, &group, entry.entry_id).await;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(stream = %stream, error = %e, "idempotency check failed");
                    continue;
                }
            }

            let result = AssertUnwindSafe(handler(entry.entry_id, entry.payload.clone()))
                .catch_unwind()
                .await;

            match result {
                Ok(Ok(())) => {
                    let _ = idempotency_record(&pool, &stream, &group, &key, opts.idempotency_ttl)
                        .await;
                    let _ = ack(&pool, &stream, &group, entry.entry_id).await;
                }
                Ok(Err(handler_err)) => {
                    handle_failure(
                        &pool,
                        &stream,
                        &dlq_stream,
                        &group,
                        &entry,
                        &handler_err.to_string(),
                        matches!(handler_err, HandlerError::Permanent(_)),
                        opts.max_failures,
                    )
                    .await;
                }
                Err(_panic) => {
                    handle_failure(
                        &pool,
                        &stream,
                        &dlq_stream,
                        &group,
                        &entry,
                        "handler panicked",
                        true,
                        opts.max_failures,
                    )
                    .await;
                }
            }
        }
    }
}

/// `is_permanent` distinguishes the two failure kinds spec.md §4.1 and
/// §5 name: `Transient` leaves the entry unacked without counting toward
/// the DLQ threshold (network/KV blips are expected to clear on retry);
/// `Permanent`/poison increments the failure counter and DLQs once it
/// reaches `max_failures`.
#[allow(clippy::too_many_arguments)]
async fn handle_failure(
    pool: &PgPool,
    stream: &str,
    dlq_stream: &str,
    group: &str,
    entry: &ClaimedEntry,
    error: &str,
    is_permanent: bool,
    max_failures: i32,
) {
    if !is_permanent {
        if let Err(e) = release_unacked_transient(pool, stream, group, entry.entry_id, error).await
        {
            tracing::warn!(stream = %stream, error = %e, "failed to record transient handler failure");
        }
        return;
    }

    let failures = match release_unacked(pool, stream, group, entry.entry_id, error).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(stream = %stream, error = %e, "failed to record handler failure");
            return;
        }
    };

    if failures >= max_failures {
        if let Err(e) = send_to_dlq(pool, stream, dlq_stream, &entry.payload, failures, error).await
        {
            tracing::warn!(stream = %stream, error = %e, "failed to write DLQ entry");
            return;
        }
        let _ = ack(pool, stream, group, entry.entry_id).await;
    }
}

/// Spawn a background task sampling `streamPending{stream,group}` every
/// `interval` (spec.md §4.1: "sampled every ≥ 5 s").
pub fn spawn_pending_gauge(
    pool: PgPool,
    stream: String,
    group: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
            if *shutdown.borrow() {
                return;
            }
            if let Ok(n) = pending_count(&pool, &stream, &group).await {
                metrics::gauge!("stream_pending", "stream" => stream.clone(), "group" => group.clone())
                    .set(n as f64);
            }
        }
    });
}
