//! `notify.events` stream consumer (spec.md §4.9): reacts only to
//! `severity=critical` events; info/warning are no-ops. Each target
//! (ticket, knowledge base) is attempted independently, and a non-critical
//! or partially-failed outcome never fails the stream entry — spec.md is
//! explicit that "non-critical outcomes never fail the stream entry".

use std::sync::Arc;
use std::time::Duration;

use qf_bus::{ConsumeOpts, HandlerError};
use qf_integrations::{handle_event, TargetResult};
use qf_wire::{streams, DataEnvelope, Event};
use serde_json::Value;
use tokio::sync::watch;

use crate::state::AppState;

const SERVICE_NAME: &str = "integrations-worker";

fn idempotency_key(payload: &Value) -> String {
    payload
        .get("data")
        .and_then(|d| d.get("requestId").or_else(|| d.get("traceId")))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn record(target: &str, result: TargetResult) {
    let label = match result {
        TargetResult::Ok => "ok",
        TargetResult::Fail => "fail",
        TargetResult::Error => "error",
    };
    metrics::counter!("integration_target_total", "target" => target.to_string(), "result" => label.to_string())
        .increment(1);
}

async fn handle(state: Arc<AppState>, entry_id: i64, payload: Value) -> Result<(), HandlerError> {
    let envelope: DataEnvelope<Event> = serde_json::from_value(payload)
        .map_err(|e| HandlerError::Permanent(format!("decode event (entry {entry_id}): {e}")))?;
    let event = envelope.data;

    let outcome = handle_event(&event, &state.tickets, &state.kb).await;
    if let Some(result) = outcome.ticket {
        record("ticket", result);
    }
    if let Some(result) = outcome.kb {
        record("kb", result);
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
    let handler_state = Arc::clone(&state);
    tokio::spawn(qf_bus::consume(
        pool,
        streams::NOTIFY_EVENTS.to_string(),
        group.clone(),
        consumer_id,
        opts,
        move |entry_id, payload| handle(Arc::clone(&handler_state), entry_id, payload),
        shutdown.clone(),
    ));

    qf_bus::spawn_pending_gauge(
        state.pool.clone(),
        streams::NOTIFY_EVENTS.to_string(),
        group,
        Duration::from_secs(5),
        shutdown,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_prefers_request_id() {
        let payload = serde_json::json!({ "data": { "requestId": "r-1", "traceId": "t-1" } });
        assert_eq!(idempotency_key(&payload), "r-1");
    }
}
