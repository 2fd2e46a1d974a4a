//! `notify.events` stream consumer (spec.md §4.6): every event any other
//! service appends lands here, gets recorded into the bounded "recent" list,
//! and is dispatched to its severity's webhook.

use std::sync::Arc;
use std::time::Duration;

use qf_bus::{ConsumeOpts, HandlerError};
use qf_wire::{streams, DataEnvelope, Event};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::watch;

use crate::state::AppState;

const SERVICE_NAME: &str = "notifier-worker";

/// `notify.events` is the generic sink every stage writes to (spec.md §2:
/// "Every stage also writes `notify.events`"), so many distinct events
/// legitimately share one `traceId`/`requestId`. Keying on either would
/// make every event after the first for a trace look like a duplicate and
/// get silently dropped for the idempotency TTL. Hash the full payload
/// instead, so only a byte-for-byte repeat of the same event is suppressed.
fn idempotency_key(payload: &Value) -> String {
    let canonical = serde_json::to_vec(payload).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

async fn handle(state: Arc<AppState>, entry_id: i64, payload: Value) -> Result<(), HandlerError> {
    let envelope: DataEnvelope<Event> = serde_json::from_value(payload)
        .map_err(|e| HandlerError::Permanent(format!("decode event (entry {entry_id}): {e}")))?;
    let event = envelope.data;

    qf_kv::notify::record(&state.pool, &event)
        .await
        .map_err(|e| HandlerError::Transient(format!("record notify event: {e}")))?;

    qf_notify::dispatch(&state.sink, &state.router, &event)
        .await
        .map_err(|e| HandlerError::Transient(format!("dispatch notify event: {e}")))?;

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
    fn idempotency_key_is_deterministic_for_the_same_payload() {
        let payload = serde_json::json!({ "data": { "requestId": "r-1", "type": "risk_rejected" } });
        assert_eq!(idempotency_key(&payload), idempotency_key(&payload));
    }

    #[test]
    fn idempotency_key_differs_for_distinct_events_sharing_a_trace_id() {
        let first = serde_json::json!({ "data": { "traceId": "t-1", "type": "risk_rejected" } });
        let second = serde_json::json!({ "data": { "traceId": "t-1", "type": "daily_target_reached" } });
        assert_ne!(idempotency_key(&first), idempotency_key(&second));
    }
}
