//! In-flight per-`requestId` orchestrator run state (spec.md §4.8, §5's
//! ordering-tolerance contract: a late `exec.status` for an old `requestId`
//! must still resolve against remembered `{symbol, side, confidence}`).
//! Persisted rather than held only in-process so a restart doesn't strand
//! an in-flight async run — the orchestrator is the only writer.

use anyhow::{Context, Result};
use qf_wire::Side;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub request_id: String,
    pub trace_id: Uuid,
    pub symbol: String,
    pub side: Option<Side>,
    pub confidence: Option<f64>,
    pub mode: String,
    pub state: String,
}

fn side_str(side: Side) -> &'static str {
    side.as_str()
}

fn parse_side(raw: &str) -> Option<Side> {
    match raw {
        "buy" => Some(Side::Buy),
        "sell" => Some(Side::Sell),
        _ => None,
    }
}

pub async fn create(pool: &PgPool, record: &RunRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO orchestrator_runs (request_id, trace_id, symbol, side, confidence, mode, state) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (request_id) DO NOTHING",
    )
    .bind(&record.request_id)
    .bind(record.trace_id)
    .bind(&record.symbol)
    .bind(record.side.map(side_str))
    .bind(record.confidence)
    .bind(&record.mode)
    .bind(&record.state)
    .execute(pool)
    .await
    .context("create orchestrator_run")?;
    Ok(())
}

pub async fn get(pool: &PgPool, request_id: &str) -> Result<Option<RunRecord>> {
    let row: Option<(String, Uuid, String, Option<String>, Option<f64>, String, String)> =
        sqlx::query_as(
            "SELECT request_id, trace_id, symbol, side, confidence, mode, state \
             FROM orchestrator_runs WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_optional(pool)
        .await
        .context("get orchestrator_run")?;

    Ok(row.map(
        |(request_id, trace_id, symbol, side, confidence, mode, state)| RunRecord {
            request_id,
            trace_id,
            symbol,
            side: side.as_deref().and_then(parse_side),
            confidence,
            mode,
            state,
        },
    ))
}

/// Fold in the analyst's `{side, confidence}` once `analysis.signals` is
/// observed; advance `state`.
pub async fn record_signal(
    pool: &PgPool,
    request_id: &str,
    side: Side,
    confidence: f64,
    state: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE orchestrator_runs SET side = $2, confidence = $3, state = $4, updated_at = now() \
         WHERE request_id = $1",
    )
    .bind(request_id)
    .bind(side_str(side))
    .bind(confidence)
    .bind(state)
    .execute(pool)
    .await
    .context("record_signal on orchestrator_run")?;
    Ok(())
}

pub async fn set_state(pool: &PgPool, request_id: &str, state: &str) -> Result<()> {
    sqlx::query("UPDATE orchestrator_runs SET state = $2, updated_at = now() WHERE request_id = $1")
        .bind(request_id)
        .bind(state)
        .execute(pool)
        .await
        .context("set_state on orchestrator_run")?;
    Ok(())
}

/// Trim run records older than `ttl` — called periodically rather than on
/// every write, since the table is an audit-adjacent log of recent runs,
/// not a hot path.
pub async fn trim_older_than(pool: &PgPool, ttl: chrono::Duration) -> Result<u64> {
    let cutoff = chrono::Utc::now() - ttl;
    let result = sqlx::query("DELETE FROM orchestrator_runs WHERE created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await
        .context("trim orchestrator_runs")?;
    Ok(result.rows_affected())
}
