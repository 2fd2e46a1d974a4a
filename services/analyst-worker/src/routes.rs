use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use qf_http::{ApiError, TraceIds};
use qf_wire::{Side, Signal};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/analysis/analyze", post(analyze))
        .with_state(state);
    let router = qf_http::with_ambient_routes(router);
    router.layer(axum::middleware::from_fn(qf_http::trace_layer))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub request_id: Option<Uuid>,
    pub symbol: String,
    /// Caller-supplied override (spec.md §8 scenario 3 drives the strategy
    /// with an explicit `side`/`confidence` for a deterministic test
    /// scenario); when present it passes through unchanged rather than
    /// being derived (SPEC_FULL §4.4).
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub trace_id: Option<Uuid>,
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    ids: TraceIds,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<Signal>, ApiError> {
    let request_id = body.request_id.unwrap_or(ids.request_id);
    let trace_id = body.trace_id.unwrap_or(ids.trace_id);

    let (side, confidence) = match (body.side, body.confidence) {
        (Some(side), Some(confidence)) => (side, confidence),
        _ => state.source.derive(&body.symbol, request_id),
    };

    let signal = Signal {
        request_id,
        symbol: body.symbol,
        side,
        confidence,
        trace_id,
        ts: Utc::now(),
    };

    Ok(Json(signal))
}
