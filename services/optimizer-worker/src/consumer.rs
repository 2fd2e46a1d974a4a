//! `opt.requests` stream consumer (spec.md §4.7). Each entry is one
//! observed loss; folded through the shared proposal pipeline as a
//! single-sample history.

use std::sync::Arc;
use std::time::Duration;

use qf_bus::{ConsumeOpts, HandlerError};
use qf_optimizer::LossSample;
use qf_wire::{streams, DataEnvelope, OptRequest};
use serde_json::Value;
use tokio::sync::watch;

use crate::pipeline::propose_and_store;
use crate::state::AppState;

const SERVICE_NAME: &str = "optimizer-worker";

fn idempotency_key(payload: &Value) -> String {
    payload
        .get("data")
        .and_then(|d| d.get("traceId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

async fn handle(state: Arc<AppState>, entry_id: i64, payload: Value) -> Result<(), HandlerError> {
    let envelope: DataEnvelope<OptRequest> = serde_json::from_value(payload).map_err(|e| {
        HandlerError::Permanent(format!("decode opt request (entry {entry_id}): {e}"))
    })?;
    let request = envelope.data;

    let losses = [LossSample {
        profit: request.profit,
    }];

    propose_and_store(&state.pool, &losses, request.trace_id)
        .await
        .map_err(|e| HandlerError::Transient(format!("propose optimizer job: {e}")))?;

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
        streams::OPT_REQUESTS.to_string(),
        group.clone(),
        consumer_id,
        opts,
        move |entry_id, payload| handle(Arc::clone(&handler_state), entry_id, payload),
        shutdown.clone(),
    ));

    qf_bus::spawn_pending_gauge(
        state.pool.clone(),
        streams::OPT_REQUESTS.to_string(),
        group,
        Duration::from_secs(5),
        shutdown,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_reads_camel_case_trace_id() {
        let payload = serde_json::json!({ "data": { "traceId": "t-1" } });
        assert_eq!(idempotency_key(&payload), "t-1");
    }
}
