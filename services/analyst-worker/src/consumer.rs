//! `orchestrator.commands` stream consumer. Only `CommandKind::Run` produces
//! a `Signal`; `Halt` is an audit-trail entry the analyst never acts on
//! (spec.md §2 data flow: "Orchestrator writes `orchestrator.commands` →
//! Analyst emits `analysis.signals`").

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use qf_bus::{ConsumeOpts, HandlerError};
use qf_wire::{streams, CommandKind, DataEnvelope, RunCommand, Signal};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::watch;

use crate::state::AppState;

const SERVICE_NAME: &str = "analyst-worker";

fn idempotency_key(payload: &Value) -> String {
    payload
        .get("data")
        .and_then(|d| d.get("requestId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

async fn handle(state: Arc<AppState>, entry_id: i64, payload: Value) -> Result<(), HandlerError> {
    let envelope: DataEnvelope<RunCommand> = serde_json::from_value(payload).map_err(|e| {
        HandlerError::Permanent(format!("decode orchestrator command (entry {entry_id}): {e}"))
    })?;
    let command = envelope.data;

    if command.kind != CommandKind::Run {
        return Ok(());
    }

    let (side, confidence) = match (command.side, command.confidence) {
        (Some(side), Some(confidence)) => (side, confidence),
        _ => state.source.derive(&command.symbol, command.request_id),
    };

    let signal = Signal {
        request_id: command.request_id,
        symbol: command.symbol,
        side,
        confidence,
        trace_id: command.trace_id,
        ts: Utc::now(),
    };

    let signal_json = serde_json::to_value(DataEnvelope::new(signal))
        .map_err(|e| HandlerError::Permanent(format!("encode signal: {e}")))?;
    qf_bus::append(&state.pool, streams::ANALYSIS_SIGNALS, &signal_json)
        .await
        .map_err(|e| HandlerError::Transient(format!("append analysis.signals: {e}")))?;

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
        streams::ORCHESTRATOR_COMMANDS.to_string(),
        group.clone(),
        consumer_id,
        opts,
        move |entry_id, payload| handle(Arc::clone(&handler_state), entry_id, payload),
        shutdown.clone(),
    ));

    qf_bus::spawn_pending_gauge(
        state.pool.clone(),
        streams::ORCHESTRATOR_COMMANDS.to_string(),
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
}
