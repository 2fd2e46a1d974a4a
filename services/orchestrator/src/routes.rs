//! Orchestrator HTTP surface (spec.md §6): the front door for run
//! acceptance plus the admin control plane (PnL reset, halt/unhalt, DLQ
//! inspection/requeue, chat).

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use qf_http::ApiError;
use qf_wire::{streams, CommMode, PnLDay, Side};
use serde::Deserialize;
use serde_json::json;

use crate::chat::{self, ChatRequest, ChatResponse};
use crate::pipeline::{self, RunOutcome};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    // `/chat` dispatches admin intents (halt, unhalt, dlq_requeue) alongside
    // read-only ones, so the whole endpoint sits behind the admin token
    // rather than gating intents individually (spec.md §4.8: "All admin
    // intents require a pre-shared token header"; §6 lists `/chat` as part
    // of the orchestrator's admin surface).
    let admin_routes = Router::new()
        .route("/admin/pnl/reset", post(admin_pnl_reset))
        .route("/admin/orchestrate/halt", post(admin_halt))
        .route("/admin/orchestrate/unhalt", post(admin_unhalt))
        .route("/admin/streams/pending", get(admin_streams_pending))
        .route("/admin/streams/dlq", get(admin_streams_dlq))
        .route("/admin/streams/dlq/requeue", post(admin_streams_dlq_requeue))
        .route("/chat", post(chat_endpoint))
        .route_layer(middleware::from_fn(qf_http::require_admin_token))
        .layer(axum::Extension(state.admin_guard.clone()));

    let router = Router::new()
        .route("/status", get(status))
        .route("/pnl/status", get(pnl_status))
        .route("/orchestrate/run", post(orchestrate_run))
        .route("/orchestrate/stop", post(orchestrate_stop))
        .merge(admin_routes)
        .with_state(state);
    let router = qf_http::with_ambient_routes(router);
    router.layer(axum::middleware::from_fn(qf_http::trace_layer))
}

async fn status(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let pnl = qf_kv::pnl::get(&state.pool).await?;
    Ok(Json(json!({
        "commMode": pipeline::mode_str(state.settings.comm_mode),
        "pnl": pnl,
    })))
}

async fn pnl_status(State(state): State<Arc<AppState>>) -> Result<Json<PnLDay>, ApiError> {
    let pnl = qf_kv::pnl::init_day_if_needed(
        &state.pool,
        state.settings.start_equity,
        state.settings.daily_target_pct,
    )
    .await?;
    Ok(Json(pnl))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub symbol: String,
    pub mode: CommMode,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

async fn orchestrate_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunRequest>,
) -> Result<(axum::http::StatusCode, Json<RunOutcome>), ApiError> {
    let outcome =
        pipeline::dispatch_run(&state, &body.symbol, body.mode, body.side, body.confidence).await?;
    Ok((axum::http::StatusCode::ACCEPTED, Json(outcome)))
}

/// spec.md §6 lists `POST /orchestrate/stop` without further detail beyond
/// the halt/unhalt admin pair; this workspace treats it as an unauthenticated
/// alias for "halt trading, no reason given" since a caller invoking it has
/// already decided to stop the pipeline.
async fn orchestrate_stop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PnLDay>, ApiError> {
    let pnl = qf_kv::pnl::set_halted(&state.pool, true, Some("orchestrate_stop")).await?;
    Ok(Json(pnl))
}

async fn chat_endpoint(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = chat::dispatch(&state, body).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct AdminHaltRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

async fn admin_halt(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AdminHaltRequest>,
) -> Result<Json<PnLDay>, ApiError> {
    let pnl = qf_kv::pnl::set_halted(&state.pool, true, body.reason.as_deref()).await?;
    Ok(Json(pnl))
}

async fn admin_unhalt(State(state): State<Arc<AppState>>) -> Result<Json<PnLDay>, ApiError> {
    let pnl = qf_kv::pnl::set_halted(&state.pool, false, None).await?;
    Ok(Json(pnl))
}

async fn admin_pnl_reset(State(state): State<Arc<AppState>>) -> Result<Json<PnLDay>, ApiError> {
    let pnl = qf_kv::pnl::reset_day(
        &state.pool,
        state.settings.start_equity,
        state.settings.daily_target_pct,
    )
    .await?;
    Ok(Json(pnl))
}

#[derive(Debug, Deserialize)]
pub struct StreamsPendingQuery {
    pub stream: String,
    pub group: String,
}

async fn admin_streams_pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamsPendingQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pending = qf_bus::pending_count(&state.pool, &query.stream, &query.group).await?;
    Ok(Json(json!({ "stream": query.stream, "group": query.group, "pending": pending })))
}

#[derive(Debug, Deserialize)]
pub struct StreamsDlqQuery {
    pub stream: String,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default = "default_dlq_count")]
    pub count: i64,
}

fn default_dlq_count() -> i64 {
    50
}

async fn admin_streams_dlq(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamsDlqQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let dlq_stream = streams::dlq_name(&query.stream);
    let entries = qf_bus::range_dlq(
        &state.pool,
        &dlq_stream,
        query.start.unwrap_or(0),
        query.end.unwrap_or(i64::MAX),
        query.count,
    )
    .await?;

    let entries_json: Vec<serde_json::Value> = entries
        .into_iter()
        .map(|e| {
            json!({
                "id": e.id,
                "originalStream": e.original_stream,
                "failures": e.failures,
                "lastError": e.last_error,
                "payload": e.payload,
            })
        })
        .collect();

    Ok(Json(json!({ "stream": dlq_stream, "entries": entries_json })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlqRequeueRequest {
    pub dlq_stream: String,
    pub id: i64,
}

async fn admin_streams_dlq_requeue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DlqRequeueRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = qf_bus::requeue(&state.pool, &body.dlq_stream, body.id).await?;
    match outcome {
        qf_bus::RequeueOutcome::Requeued { new_entry_id } => {
            Ok(Json(json!({ "requeued": true, "newEntryId": new_entry_id })))
        }
        qf_bus::RequeueOutcome::NotFound => Err(ApiError::NotFound(format!(
            "dlq entry {} not found in {}",
            body.id, body.dlq_stream
        ))),
    }
}
