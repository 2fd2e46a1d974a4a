use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use qf_http::{ApiError, TraceIds};
use qf_wire::{ExecStatus, Side};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/trade/submit", post(submit))
        .with_state(state);
    let router = qf_http::with_ambient_routes(router);
    router.layer(axum::middleware::from_fn(qf_http::trace_layer))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    #[serde(default)]
    pub trace_id: Option<Uuid>,
}

async fn submit(
    State(state): State<Arc<AppState>>,
    ids: TraceIds,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<ExecStatus>, ApiError> {
    let order = qf_wire::Order {
        order_id: body.order_id,
        symbol: body.symbol,
        side: body.side,
        qty: body.qty,
        trace_id: body.trace_id.unwrap_or(ids.trace_id),
        ts: Utc::now(),
    };

    let status = state.gateway.submit(&state.pool, &order).await?;
    Ok(Json(status))
}
