use std::sync::Arc;

use axum::{
    extract::{Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use qf_http::ApiError;
use qf_wire::Event;
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/admin/notify/ack", post(ack))
        .route_layer(middleware::from_fn(qf_http::require_admin_token))
        .layer(axum::Extension(state.admin_guard.clone()));

    let router = Router::new()
        .route("/notify", post(notify))
        .route("/notify/recent", get(recent))
        .merge(admin_routes)
        .with_state(state);
    let router = qf_http::with_ambient_routes(router);
    router.layer(axum::middleware::from_fn(qf_http::trace_layer))
}

async fn notify(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Event>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = qf_kv::notify::record(&state.pool, &event).await?;
    qf_notify::dispatch(&state.sink, &state.router, &event).await?;
    Ok(Json(serde_json::json!({ "id": id })))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

async fn recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events = qf_kv::notify::recent(&state.pool, query.limit).await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequest {
    #[serde(default)]
    pub request_id: Option<Uuid>,
    #[serde(default)]
    pub trace_id: Option<Uuid>,
}

async fn ack(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AckRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.request_id.is_none() && body.trace_id.is_none() {
        return Err(ApiError::Validation(
            "requestId or traceId is required".to_string(),
        ));
    }
    let acked = qf_kv::notify::ack(&state.pool, body.request_id, body.trace_id).await?;
    Ok(Json(serde_json::json!({ "acked": acked })))
}
