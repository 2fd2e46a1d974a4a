//! `risk.requests` stream consumer (spec.md §4.3: "Public operations: HTTP
//! `POST /risk/evaluate` ... and stream consumer on `risk.requests`.").
//! Decisions land on `risk.responses`; rejections additionally emit a
//! `notify.events` entry of severity `info` (spec.md §4.3 line "Rejections
//! additionally emit a `notify.events` entry of severity `info`.").

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use qf_bus::{ConsumeOpts, HandlerError};
use qf_wire::{streams, DataEnvelope, Event, RiskRequest};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::watch;

use crate::state::AppState;

const SERVICE_NAME: &str = "risk-worker";

fn idempotency_key(payload: &Value) -> String {
    payload
        .get("data")
        .and_then(|d| d.get("requestId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

async fn handle(pool: PgPool, entry_id: i64, payload: Value) -> Result<(), HandlerError> {
    let envelope: DataEnvelope<RiskRequest> = serde_json::from_value(payload)
        .map_err(|e| HandlerError::Permanent(format!("decode risk request (entry {entry_id}): {e}")))?;
    let request = envelope.data;

    let params = qf_kv::risk_params::load(&pool)
        .await
        .map_err(|e| HandlerError::Transient(format!("load risk params: {e}")))?;

    let decision = qf_risk::evaluate(&params, &request, Utc::now());

    let response = DataEnvelope::new(decision.clone());
    let response_json = serde_json::to_value(&response)
        .map_err(|e| HandlerError::Permanent(format!("encode risk decision: {e}")))?;
    qf_bus::append(&pool, streams::RISK_RESPONSES, &response_json)
        .await
        .map_err(|e| HandlerError::Transient(format!("append risk.responses: {e}")))?;

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
            .map_err(|e| HandlerError::Permanent(format!("encode risk_rejected event: {e}")))?;
        qf_bus::append(&pool, streams::NOTIFY_EVENTS, &event_json)
            .await
            .map_err(|e| HandlerError::Transient(format!("append notify.events: {e}")))?;
    }

    Ok(())
}

pub fn spawn(state: Arc<AppState>, shutdown: watch::Receiver<bool>) {
    let group = streams::group_name(SERVICE_NAME);
    let consumer_id = format!("{SERVICE_NAME}-{}", uuid::Uuid::new_v4());

    let opts = ConsumeOpts {
        block_ms: 200,
        batch_size: 20,
        idempotency_key_fn: idempotency_key,
        idempotency_ttl: chrono::Duration::seconds(state.settings.stream_idemp_ttl_seconds),
        max_failures: state.settings.stream_max_failures,
    };

    let pool = state.pool.clone();
    tokio::spawn(qf_bus::consume(
        pool.clone(),
        streams::RISK_REQUESTS.to_string(),
        group.clone(),
        consumer_id,
        opts,
        move |_entry_id, payload| handle(pool.clone(), _entry_id, payload),
        shutdown.clone(),
    ));

    qf_bus::spawn_pending_gauge(
        state.pool.clone(),
        streams::RISK_REQUESTS.to_string(),
        group,
        Duration::from_secs(5),
        shutdown,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_reads_camel_case_request_id() {
        let payload = serde_json::json!({ "data": { "requestId": "abc-123" } });
        assert_eq!(idempotency_key(&payload), "abc-123");
    }

    #[test]
    fn idempotency_key_empty_when_missing() {
        let payload = serde_json::json!({});
        assert_eq!(idempotency_key(&payload), "");
    }
}
