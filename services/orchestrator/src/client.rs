//! Synchronous sibling-service calls for `http`/`hybrid` mode (spec.md
//! §4.8: "Call analyst `/analysis/analyze` ... Call risk `/risk/evaluate`
//! ... call executor `/trade/submit`"). Every call propagates
//! `X-Request-Id`/`X-Trace-Id` and uses the fleet's 5s inter-service
//! timeout (spec.md §5); any transport error or non-2xx response becomes
//! `pipeline_failed` (502) at the caller (spec.md §4.8).

use chrono::Utc;
use qf_http::{propagate_headers, ApiError, TraceIds};
use qf_wire::{ExecStatus, Order, RiskDecision, Side, Signal};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

fn downstream_err(service: &str, err: impl std::fmt::Display) -> ApiError {
    ApiError::DownstreamDegraded(format!("{service}: {err}"))
}

async fn post_json<B: Serialize, R: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    ids: TraceIds,
    body: &B,
    timeout: std::time::Duration,
    service: &str,
) -> Result<R, ApiError> {
    let builder = http.post(url).timeout(timeout).json(body);
    let response = propagate_headers(builder, &ids)
        .send()
        .await
        .map_err(|e| downstream_err(service, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(downstream_err(service, format!("{status}: {body}")));
    }

    response
        .json::<R>()
        .await
        .map_err(|e| downstream_err(service, e))
}

#[derive(Debug, Clone, Copy)]
pub struct AnalyzeInput<'a> {
    pub request_id: Uuid,
    pub symbol: &'a str,
    pub side: Option<Side>,
    pub confidence: Option<f64>,
    pub trace_id: Uuid,
}

pub async fn analyze(
    http: &reqwest::Client,
    base_url: &str,
    ids: TraceIds,
    timeout: std::time::Duration,
    input: AnalyzeInput<'_>,
) -> Result<Signal, ApiError> {
    let url = format!("{base_url}/analysis/analyze");
    let body = json!({
        "requestId": input.request_id,
        "symbol": input.symbol,
        "side": input.side,
        "confidence": input.confidence,
        "traceId": input.trace_id,
    });
    post_json(http, &url, ids, &body, timeout, "analyst").await
}

pub async fn evaluate_risk(
    http: &reqwest::Client,
    base_url: &str,
    ids: TraceIds,
    timeout: std::time::Duration,
    signal: &Signal,
) -> Result<RiskDecision, ApiError> {
    let url = format!("{base_url}/risk/evaluate");
    let body = json!({
        "requestId": signal.request_id,
        "symbol": signal.symbol,
        "side": signal.side,
        "confidence": signal.confidence,
        "traceId": signal.trace_id,
    });
    post_json(http, &url, ids, &body, timeout, "risk").await
}

pub async fn submit_order(
    http: &reqwest::Client,
    base_url: &str,
    ids: TraceIds,
    timeout: std::time::Duration,
    order: &Order,
) -> Result<ExecStatus, ApiError> {
    let url = format!("{base_url}/trade/submit");
    let body = json!({
        "orderId": order.order_id,
        "symbol": order.symbol,
        "side": order.side,
        "qty": order.qty,
        "traceId": order.trace_id,
    });
    post_json(http, &url, ids, &body, timeout, "executor").await
}

/// Builds the `Order` submitted to the executor from an approved signal,
/// reusing `requestId` as `orderId` (spec.md §3: "Orders reuse `requestId`
/// as `orderId`").
pub fn order_from_signal(signal: &Signal, qty: i64) -> Order {
    Order {
        order_id: signal.request_id,
        symbol: signal.symbol.clone(),
        side: signal.side,
        qty,
        trace_id: signal.trace_id,
        ts: Utc::now(),
    }
}
