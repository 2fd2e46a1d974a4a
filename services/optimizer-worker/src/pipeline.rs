//! Shared proposal pipeline: `POST /optimize/run` and the `opt.requests`
//! stream consumer both fold loss samples through the same
//! `qf_optimizer::propose` call and persist/emit identically (spec.md
//! §4.7: "On each `opt.requests` entry: produce a proposed `RiskParameters`
//! set plus a backtest summary; store as `OptJob` ... and emit to
//! `opt.results` and `notify.events`").

use anyhow::{Context, Result};
use qf_optimizer::LossSample;
use qf_wire::{streams, DataEnvelope, Event, OptJob, OptJobStatus};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn propose_and_store(
    pool: &PgPool,
    losses: &[LossSample],
    trace_id: Uuid,
) -> Result<OptJob> {
    let current = qf_kv::risk_params::load(pool)
        .await
        .context("load current risk parameters")?;
    let (proposed, backtest) = qf_optimizer::propose(&current, losses);

    let job = OptJob {
        job_id: Uuid::new_v4(),
        status: OptJobStatus::PendingApproval,
        proposed,
        backtest,
        trace_id,
    };

    qf_kv::optimizer::create(pool, &job)
        .await
        .context("create opt job")?;

    let job_json = serde_json::to_value(DataEnvelope::new(job.clone()))
        .context("encode opt job")?;
    qf_bus::append(pool, streams::OPT_RESULTS, &job_json)
        .await
        .context("append opt.results")?;

    let event = Event::info(
        "optimizer_proposed",
        format!("job {} pending approval", job.job_id),
    )
    .with_trace_id(trace_id)
    .with_context(serde_json::json!({ "jobId": job.job_id }));
    let event_json = serde_json::to_value(DataEnvelope::new(event)).context("encode event")?;
    qf_bus::append(pool, streams::NOTIFY_EVENTS, &event_json)
        .await
        .context("append notify.events")?;

    Ok(job)
}
