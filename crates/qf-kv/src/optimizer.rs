//! `OptJob` store (spec.md §3/§4.7). Created on proposal, mutated on
//! approval, retained for audit — no deletion path exists here by design.

use anyhow::{Context, Result};
use qf_wire::{Backtest, OptJob, OptJobStatus, RiskParameters};
use sqlx::PgPool;
use uuid::Uuid;

fn status_str(status: OptJobStatus) -> &'static str {
    match status {
        OptJobStatus::PendingApproval => "pending_approval",
        OptJobStatus::Approved => "approved",
        OptJobStatus::Rejected => "rejected",
    }
}

fn parse_status(raw: &str) -> OptJobStatus {
    match raw {
        "approved" => OptJobStatus::Approved,
        "rejected" => OptJobStatus::Rejected,
        _ => OptJobStatus::PendingApproval,
    }
}

pub async fn create(pool: &PgPool, job: &OptJob) -> Result<()> {
    let proposed = serde_json::to_value(&job.proposed).context("serialize proposed params")?;
    let backtest = serde_json::to_value(&job.backtest).context("serialize backtest")?;
    sqlx::query(
        "INSERT INTO opt_jobs (job_id, status, proposed, backtest, trace_id) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(job.job_id)
    .bind(status_str(job.status))
    .bind(proposed)
    .bind(backtest)
    .bind(job.trace_id)
    .execute(pool)
    .await
    .context("create opt_job")?;
    Ok(())
}

pub async fn get(pool: &PgPool, job_id: Uuid) -> Result<Option<OptJob>> {
    let row: Option<(String, serde_json::Value, serde_json::Value, Uuid)> = sqlx::query_as(
        "SELECT status, proposed, backtest, trace_id FROM opt_jobs WHERE job_id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await
    .context("get opt_job")?;

    row.map(|(status, proposed, backtest, trace_id)| {
        Ok(OptJob {
            job_id,
            status: parse_status(&status),
            proposed: serde_json::from_value::<RiskParameters>(proposed)
                .context("deserialize proposed params")?,
            backtest: serde_json::from_value::<Backtest>(backtest)
                .context("deserialize backtest")?,
            trace_id,
        })
    })
    .transpose()
}

/// Transition a job's status. Does not itself swap `risk_parameters` — the
/// caller (the optimizer-worker admin handler) does that in the same
/// request, but as a separate statement against a separate table, since
/// `risk_parameters` has its own single-row atomicity contract
/// (`risk_params::store`) independent of job bookkeeping.
pub async fn set_status(pool: &PgPool, job_id: Uuid, status: OptJobStatus) -> Result<()> {
    sqlx::query("UPDATE opt_jobs SET status = $2, updated_at = now() WHERE job_id = $1")
        .bind(job_id)
        .bind(status_str(status))
        .execute(pool)
        .await
        .context("set opt_job status")?;
    Ok(())
}
