//! Asynchronous pipeline consumers for `pubsub`/`hybrid` mode (spec.md
//! §4.8 "Consumer loops"): `analysis.signals`, `risk.responses`,
//! `exec.status`. Each advances the per-`requestId` `RunState` persisted in
//! `qf_kv::runs` and forwards to the next stream in the chain.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use qf_bus::{ConsumeOpts, HandlerError};
use qf_kv::runs::RunRecord;
use qf_wire::{streams, DataEnvelope, ExecStatus, RiskRequest, Signal};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::watch;
use uuid::Uuid;

use crate::pipeline::{self, DEFAULT_ORDER_QTY};
use crate::run_state::{RunEvent, RunState};
use crate::state::AppState;

const SERVICE_NAME: &str = "orchestrator";

fn request_id_key(payload: &Value) -> String {
    payload
        .get("data")
        .and_then(|d| d.get("requestId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn order_id_key(payload: &Value) -> String {
    payload
        .get("data")
        .and_then(|d| d.get("orderId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// `analysis.signals(p)`: remember `{symbol, side, confidence}` keyed by
/// `requestId`, emit `risk.requests` (spec.md §4.8).
async fn handle_signal(pool: PgPool, entry_id: i64, payload: Value) -> Result<(), HandlerError> {
    let envelope: DataEnvelope<Signal> = serde_json::from_value(payload)
        .map_err(|e| HandlerError::Permanent(format!("decode signal (entry {entry_id}): {e}")))?;
    let signal = envelope.data;
    let request_id = signal.request_id.to_string();

    qf_kv::runs::record_signal(
        &pool,
        &request_id,
        signal.side,
        signal.confidence,
        RunState::Evaluating.as_str(),
    )
    .await
    .map_err(|e| HandlerError::Transient(format!("record signal: {e}")))?;

    let request = RiskRequest::from(signal);
    let request_json = serde_json::to_value(DataEnvelope::new(request))
        .map_err(|e| HandlerError::Permanent(format!("encode risk request: {e}")))?;
    qf_bus::append(&pool, streams::RISK_REQUESTS, &request_json)
        .await
        .map_err(|e| HandlerError::Transient(format!("append risk.requests: {e}")))?;

    Ok(())
}

/// `risk.responses(p)`: if approved, re-check `halted` then emit
/// `exec.orders`; else emit `risk_rejected` (spec.md §4.8).
async fn handle_risk_response(
    pool: PgPool,
    entry_id: i64,
    payload: Value,
) -> Result<(), HandlerError> {
    let envelope: DataEnvelope<qf_wire::RiskDecision> = serde_json::from_value(payload)
        .map_err(|e| HandlerError::Permanent(format!("decode risk decision (entry {entry_id}): {e}")))?;
    let decision = envelope.data;
    let request_id = decision.request_id.to_string();

    let record: Option<RunRecord> = qf_kv::runs::get(&pool, &request_id)
        .await
        .map_err(|e| HandlerError::Transient(format!("load run record: {e}")))?;
    let Some(record) = record else {
        tracing::warn!(request_id = %request_id, "risk.responses: no remembered run, dropping");
        return Ok(());
    };

    if !decision.ok {
        qf_kv::runs::set_state(&pool, &request_id, RunState::Rejected.as_str())
            .await
            .map_err(|e| HandlerError::Transient(format!("persist rejected state: {e}")))?;

        let reason = decision
            .reason
            .map(|r| r.as_str().to_string())
            .unwrap_or_default();
        pipeline::emit_risk_rejected(&pool, decision.request_id, decision.trace_id, &record.symbol, &reason)
            .await
            .map_err(|e| HandlerError::Transient(format!("emit risk_rejected: {e}")))?;
        return Ok(());
    }

    let pnl = qf_kv::pnl::get(&pool)
        .await
        .map_err(|e| HandlerError::Transient(format!("load pnl: {e}")))?;
    if pnl.halted {
        tracing::info!(request_id = %request_id, "risk approved but trading halted, dropping order");
        qf_kv::runs::set_state(&pool, &request_id, RunState::Rejected.as_str())
            .await
            .map_err(|e| HandlerError::Transient(format!("persist rejected-on-halt state: {e}")))?;
        return Ok(());
    }

    qf_kv::runs::set_state(&pool, &request_id, RunState::Submitting.as_str())
        .await
        .map_err(|e| HandlerError::Transient(format!("persist submitting state: {e}")))?;

    let side = record
        .side
        .ok_or_else(|| HandlerError::Permanent("run record missing side".to_string()))?;
    let order = qf_wire::Order {
        order_id: decision.request_id,
        symbol: record.symbol,
        side,
        qty: DEFAULT_ORDER_QTY,
        trace_id: decision.trace_id,
        ts: Utc::now(),
    };
    let order_json = serde_json::to_value(DataEnvelope::new(order))
        .map_err(|e| HandlerError::Permanent(format!("encode order: {e}")))?;
    qf_bus::append(&pool, streams::EXEC_ORDERS, &order_json)
        .await
        .map_err(|e| HandlerError::Transient(format!("append exec.orders: {e}")))?;

    Ok(())
}

/// `exec.status(p)`: fold terminal fills into PnL/halt/loss-trigger via the
/// shared `pipeline::apply_fill`, and persist the final `RunState`.
async fn handle_exec_status(
    state: Arc<AppState>,
    entry_id: i64,
    payload: Value,
) -> Result<(), HandlerError> {
    let envelope: DataEnvelope<ExecStatus> = serde_json::from_value(payload)
        .map_err(|e| HandlerError::Permanent(format!("decode exec status (entry {entry_id}): {e}")))?;
    let status = envelope.data;
    let request_id = status.order_id.to_string();

    let event = match status.status {
        qf_wire::ExecStatusKind::Filled => RunEvent::ExecFilled,
        qf_wire::ExecStatusKind::Rejected => RunEvent::ExecRejected,
        qf_wire::ExecStatusKind::Failed | qf_wire::ExecStatusKind::Canceled => RunEvent::ExecFailed,
        qf_wire::ExecStatusKind::Pending => return Ok(()),
    };

    pipeline::advance_run_state(&state.pool, &request_id, event)
        .await
        .map_err(|e| HandlerError::Transient(format!("advance run state: {e}")))?;

    pipeline::apply_fill(&state.pool, &state.settings, &status)
        .await
        .map_err(|e| HandlerError::Transient(format!("apply fill: {e}")))?;

    Ok(())
}

pub fn spawn(state: Arc<AppState>, shutdown: watch::Receiver<bool>) {
    spawn_signal_consumer(Arc::clone(&state), shutdown.clone());
    spawn_risk_response_consumer(Arc::clone(&state), shutdown.clone());
    spawn_exec_status_consumer(state, shutdown);
}

fn spawn_signal_consumer(state: Arc<AppState>, shutdown: watch::Receiver<bool>) {
    let group = streams::group_name(SERVICE_NAME);
    let consumer_id = format!("{SERVICE_NAME}-signals-{}", Uuid::new_v4());
    let opts = ConsumeOpts {
        block_ms: 200,
        batch_size: 20,
        idempotency_key_fn: request_id_key,
        idempotency_ttl: chrono::Duration::seconds(state.settings.stream_idemp_ttl_seconds),
        max_failures: state.settings.stream_max_failures,
    };
    let pool = state.pool.clone();
    tokio::spawn(qf_bus::consume(
        pool.clone(),
        streams::ANALYSIS_SIGNALS.to_string(),
        group.clone(),
        consumer_id,
        opts,
        move |entry_id, payload| handle_signal(pool.clone(), entry_id, payload),
        shutdown.clone(),
    ));
    qf_bus::spawn_pending_gauge(
        state.pool.clone(),
        streams::ANALYSIS_SIGNALS.to_string(),
        group,
        Duration::from_secs(5),
        shutdown,
    );
}

fn spawn_risk_response_consumer(state: Arc<AppState>, shutdown: watch::Receiver<bool>) {
    let group = streams::group_name(SERVICE_NAME);
    let consumer_id = format!("{SERVICE_NAME}-risk-responses-{}", Uuid::new_v4());
    let opts = ConsumeOpts {
        block_ms: 200,
        batch_size: 20,
        idempotency_key_fn: request_id_key,
        idempotency_ttl: chrono::Duration::seconds(state.settings.stream_idemp_ttl_seconds),
        max_failures: state.settings.stream_max_failures,
    };
    let pool = state.pool.clone();
    tokio::spawn(qf_bus::consume(
        pool.clone(),
        streams::RISK_RESPONSES.to_string(),
        group.clone(),
        consumer_id,
        opts,
        move |entry_id, payload| handle_risk_response(pool.clone(), entry_id, payload),
        shutdown.clone(),
    ));
    qf_bus::spawn_pending_gauge(
        state.pool.clone(),
        streams::RISK_RESPONSES.to_string(),
        group,
        Duration::from_secs(5),
        shutdown,
    );
}

fn spawn_exec_status_consumer(state: Arc<AppState>, shutdown: watch::Receiver<bool>) {
    let group = streams::group_name(SERVICE_NAME);
    let consumer_id = format!("{SERVICE_NAME}-exec-status-{}", Uuid::new_v4());
    let opts = ConsumeOpts {
        block_ms: 200,
        batch_size: 20,
        idempotency_key_fn: order_id_key,
        idempotency_ttl: chrono::Duration::seconds(state.settings.stream_idemp_ttl_seconds),
        max_failures: state.settings.stream_max_failures,
    };
    let pool = state.pool.clone();
    let handler_state = Arc::clone(&state);
    tokio::spawn(qf_bus::consume(
        pool,
        streams::EXEC_STATUS.to_string(),
        group.clone(),
        consumer_id,
        opts,
        move |entry_id, payload| handle_exec_status(Arc::clone(&handler_state), entry_id, payload),
        shutdown.clone(),
    ));
    qf_bus::spawn_pending_gauge(
        state.pool.clone(),
        streams::EXEC_STATUS.to_string(),
        group,
        Duration::from_secs(5),
        shutdown,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_key_reads_camel_case_field() {
        let payload = serde_json::json!({ "data": { "requestId": "abc-123" } });
        assert_eq!(request_id_key(&payload), "abc-123");
    }

    #[test]
    fn order_id_key_reads_camel_case_field() {
        let payload = serde_json::json!({ "data": { "orderId": "order-9" } });
        assert_eq!(order_id_key(&payload), "order-9");
    }
}
