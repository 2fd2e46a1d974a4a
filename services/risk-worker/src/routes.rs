use std::sync::Arc;

use anyhow::Context as _;
use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use qf_http::{ApiError, TraceIds};
use qf_wire::{streams, DataEnvelope, Event, RiskDecision, RiskRequest, Side};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/risk/evaluate", post(evaluate))
        .with_state(state);
    let router = qf_http::with_ambient_routes(router);
    router.layer(axum::middleware::from_fn(qf_http::trace_layer))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    #[serde(default)]
    pub request_id: Option<Uuid>,
    pub symbol: String,
    pub side: Side,
    pub confidence: f64,
    #[serde(default)]
    pub trace_id: Option<Uuid>,
}

async fn evaluate(
    State(state): State<Arc<AppState>>,
    ids: TraceIds,
    Json(body): Json<EvaluateRequest>,
) -> Result<Json<RiskDecision>, ApiError> {
    if !(0.0..=1.0).contains(&body.confidence) {
        return Err(ApiError::Validation(
            "confidence must be within [0, 1]".to_string(),
        ));
    }

    let params = qf_kv::risk_params::load(&state.pool).await?;
    let request = RiskRequest {
        request_id: body.request_id.unwrap_or(ids.request_id),
        symbol: body.symbol,
        side: body.side,
        confidence: body.confidence,
        trace_id: body.trace_id.unwrap_or(ids.trace_id),
        ts: Utc::now(),
    };

    let decision = qf_risk::evaluate(&params, &request, Utc::now());

    if !decision.ok {
        let reason = decision
            .reason
            .map(|r| r.as_str().to_string())
            .unwrap_or_default();
        let event = Event::info("risk_rejected", format!("rejected: {reason}"))
            .with_request_id(decision.request_id)
            .with_trace_id(decision.trace_id)
            .with_context(serde_json::json!({ "symbol": request.symbol, "reason": reason }));
        let event_json = serde_json::to_value(DataEnvelope::new(event))
            .context("encode risk_rejected event")?;
        qf_bus::append(&state.pool, streams::NOTIFY_EVENTS, &event_json).await?;
    }

    Ok(Json(decision))
}
