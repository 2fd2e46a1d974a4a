use std::sync::Arc;

use anyhow::Context as _;
use axum::{extract::State, middleware, routing::{get, post}, Json, Router};
use qf_http::ApiError;
use qf_optimizer::LossSample;
use qf_wire::{streams, DataEnvelope, Event, OptJob, OptJobStatus, RiskParameters};
use serde::Deserialize;
use uuid::Uuid;

use crate::pipeline::propose_and_store;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/admin/optimize/approve", post(approve))
        .route_layer(middleware::from_fn(qf_http::require_admin_token))
        .layer(axum::Extension(state.admin_guard.clone()));

    let router = Router::new()
        .route("/optimize/run", post(run))
        .route("/optimize/params", get(params))
        .merge(admin_routes)
        .with_state(state);
    let router = qf_http::with_ambient_routes(router);
    router.layer(axum::middleware::from_fn(qf_http::trace_layer))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LossInput {
    pub profit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub losses: Vec<LossInput>,
    #[serde(default)]
    pub trace_id: Option<Uuid>,
}

async fn run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunRequest>,
) -> Result<Json<OptJob>, ApiError> {
    if body.losses.is_empty() {
        return Err(ApiError::Validation(
            "losses must contain at least one sample".to_string(),
        ));
    }

    let losses: Vec<LossSample> = body
        .losses
        .iter()
        .map(|l| LossSample { profit: l.profit })
        .collect();
    let trace_id = body.trace_id.unwrap_or_else(Uuid::new_v4);

    let job = propose_and_store(&state.pool, &losses, trace_id).await?;
    Ok(Json(job))
}

async fn params(State(state): State<Arc<AppState>>) -> Result<Json<RiskParameters>, ApiError> {
    let params = qf_kv::risk_params::load(&state.pool).await?;
    Ok(Json(params))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub job_id: Uuid,
}

async fn approve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApproveRequest>,
) -> Result<Json<OptJob>, ApiError> {
    let job = qf_kv::optimizer::get(&state.pool, body.job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("opt job {} not found", body.job_id)))?;

    if job.status != OptJobStatus::PendingApproval {
        return Err(ApiError::conflict(
            "opt job is not pending approval",
            serde_json::json!({ "status": job.status }),
        ));
    }

    qf_kv::risk_params::store(&state.pool, &job.proposed).await?;
    qf_kv::optimizer::set_status(&state.pool, job.job_id, OptJobStatus::Approved).await?;

    metrics::gauge!("active_min_confidence").set(job.proposed.min_confidence);

    let event = Event::info("optimizer_approved", format!("job {} approved", job.job_id))
        .with_trace_id(job.trace_id)
        .with_context(serde_json::json!({ "jobId": job.job_id }));
    let event_json =
        serde_json::to_value(DataEnvelope::new(event)).context("encode optimizer_approved event")?;
    qf_bus::append(&state.pool, streams::NOTIFY_EVENTS, &event_json).await?;

    Ok(Json(OptJob {
        status: OptJobStatus::Approved,
        ..job
    }))
}
