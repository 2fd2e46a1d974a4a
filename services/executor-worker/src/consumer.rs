//! `exec.orders` stream consumer (spec.md §4.5). Every order flows through
//! the same `ExecutionGateway::submit` the HTTP handler uses.

use std::sync::Arc;
use std::time::Duration;

use qf_bus::{ConsumeOpts, HandlerError};
use qf_wire::{streams, DataEnvelope, Order};
use serde_json::Value;
use tokio::sync::watch;

use crate::state::AppState;

const SERVICE_NAME: &str = "executor-worker";

fn idempotency_key(payload: &Value) -> String {
    payload
        .get("data")
        .and_then(|d| d.get("orderId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

async fn handle(state: Arc<AppState>, entry_id: i64, payload: Value) -> Result<(), HandlerError> {
    let envelope: DataEnvelope<Order> = serde_json::from_value(payload)
        .map_err(|e| HandlerError::Permanent(format!("decode order (entry {entry_id}): {e}")))?;
    let order = envelope.data;

    let status = state
        .gateway
        .submit(&state.pool, &order)
        .await
        .map_err(|e| HandlerError::Transient(format!("submit order: {e}")))?;

    let status_json = serde_json::to_value(DataEnvelope::new(status))
        .map_err(|e| HandlerError::Permanent(format!("encode exec status: {e}")))?;
    qf_bus::append(&state.pool, streams::EXEC_STATUS, &status_json)
        .await
        .map_err(|e| HandlerError::Transient(format!("append exec.status: {e}")))?;

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
        streams::EXEC_ORDERS.to_string(),
        group.clone(),
        consumer_id,
        opts,
        move |entry_id, payload| handle(Arc::clone(&handler_state), entry_id, payload),
        shutdown.clone(),
    ));

    qf_bus::spawn_pending_gauge(
        state.pool.clone(),
        streams::EXEC_ORDERS.to_string(),
        group,
        Duration::from_secs(5),
        shutdown,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_reads_camel_case_order_id() {
        let payload = serde_json::json!({ "data": { "orderId": "order-1" } });
        assert_eq!(idempotency_key(&payload), "order-1");
    }
}
