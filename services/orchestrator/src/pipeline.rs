//! Pipeline logic shared across the synchronous HTTP path, the `pubsub`/
//! `hybrid` stream consumers, and the admin/chat surface: everything in
//! spec.md §4.8 that is not routing glue.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use qf_http::{ApiError, TraceIds};
use qf_kv::runs::RunRecord;
use qf_wire::{
    streams, CommMode, CommandKind, DataEnvelope, Event, ExecStatus, ExecStatusKind, OptRequest,
    RiskDecision, RunCommand, Severity, Side, Signal,
};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::client;
use crate::run_state::{RunEvent, RunState};
use crate::state::AppState;

/// Order quantity the orchestrator submits per approved signal. spec.md's
/// `POST /orchestrate/run` request carries no quantity field; this fleet
/// fixes one unit per run rather than inventing a sizing model the spec
/// never describes (DESIGN.md Open Question).
pub const DEFAULT_ORDER_QTY: i64 = 1;

pub fn mode_str(mode: CommMode) -> &'static str {
    match mode {
        CommMode::Http => "http",
        CommMode::Pubsub => "pubsub",
        CommMode::Hybrid => "hybrid",
    }
}

async fn append_event(pool: &PgPool, event: Event) -> anyhow::Result<()> {
    let json = serde_json::to_value(DataEnvelope::new(event)).context("encode event")?;
    qf_bus::append(pool, streams::NOTIFY_EVENTS, &json)
        .await
        .context("append notify.events")?;
    Ok(())
}

/// Emitted when risk rejects a signal, in both the synchronous and
/// asynchronous paths (spec.md §4.8: "emit a `risk_rejected` event").
pub async fn emit_risk_rejected(
    pool: &PgPool,
    request_id: Uuid,
    trace_id: Uuid,
    symbol: &str,
    reason: &str,
) -> anyhow::Result<()> {
    let event = Event::info("risk_rejected", format!("rejected: {reason}"))
        .with_request_id(request_id)
        .with_trace_id(trace_id)
        .with_context(serde_json::json!({ "symbol": symbol, "reason": reason }));
    append_event(pool, event).await
}

/// Folds a terminal `ExecStatus` into the daily PnL ledger, the halt latch,
/// and the loss-triggered optimizer cooldown — the three side effects
/// spec.md §4.8 attaches to `exec.status(p)` with `status=filled`, shared
/// between the synchronous HTTP path (which observes the status directly)
/// and the `exec.status` stream consumer (spec.md §2 data flow).
pub async fn apply_fill(
    pool: &PgPool,
    settings: &qf_config::settings::Settings,
    status: &ExecStatus,
) -> anyhow::Result<()> {
    if status.status != ExecStatusKind::Filled {
        return Ok(());
    }
    let profit = status.profit.unwrap_or(0.0);

    let (pnl, just_latched) = qf_kv::pnl::increment(pool, profit)
        .await
        .context("increment pnl_day")?;

    if just_latched {
        let halt_command = RunCommand {
            kind: CommandKind::Halt,
            request_id: Uuid::new_v4(),
            symbol: status.symbol.clone(),
            mode: CommMode::Pubsub,
            side: None,
            confidence: None,
            reason: pnl.halt_reason.clone(),
            trace_id: status.trace_id,
            ts: Utc::now(),
        };
        let command_json =
            serde_json::to_value(DataEnvelope::new(halt_command)).context("encode halt command")?;
        qf_bus::append(pool, streams::ORCHESTRATOR_COMMANDS, &command_json)
            .await
            .context("append halt command")?;

        let event = Event::info(
            "daily_target_reached",
            format!(
                "daily PnL target reached ({:.2}% >= {:.2}%), trading halted",
                pnl.pnl_pct, pnl.daily_target_pct
            ),
        )
        .with_severity(Severity::Warning)
        .with_trace_id(status.trace_id)
        .with_context(serde_json::json!({ "pnlUsd": pnl.pnl_usd, "pnlPct": pnl.pnl_pct }));
        append_event(pool, event).await?;
    }

    if settings.enable_opt_on_loss && profit <= -settings.opt_min_loss {
        let acquired = qf_kv::cooldown::try_acquire(
            pool,
            "opt:cooldown:loss",
            chrono::Duration::seconds(settings.opt_cooldown_seconds),
        )
        .await
        .context("acquire opt cooldown")?;

        if acquired {
            let opt_request = OptRequest {
                symbol: status.symbol.clone(),
                profit,
                trace_id: status.trace_id,
                ts: Utc::now(),
            };
            let request_json =
                serde_json::to_value(DataEnvelope::new(opt_request)).context("encode opt request")?;
            qf_bus::append(pool, streams::OPT_REQUESTS, &request_json)
                .await
                .context("append opt.requests")?;
        }
    }

    Ok(())
}

/// Advance a persisted run's state, logging (never panicking on) an
/// unreachable transition per spec.md §4.8: "Unreachable states ... are
/// treated as bugs and logged."
pub async fn advance_run_state(
    pool: &PgPool,
    request_id: &str,
    event: crate::run_state::RunEvent,
) -> anyhow::Result<()> {
    let Some(record) = qf_kv::runs::get(pool, request_id).await? else {
        tracing::warn!(request_id, "advance_run_state: no run record found");
        return Ok(());
    };
    let Some(current) = RunState::parse(&record.state) else {
        tracing::error!(request_id, state = %record.state, "unparseable run state");
        return Ok(());
    };

    match current.advance(event) {
        Ok(next) => {
            qf_kv::runs::set_state(pool, request_id, next.as_str())
                .await
                .context("persist run state")?;
        }
        Err(illegal) => {
            tracing::error!(request_id, %illegal, "unreachable run state transition");
        }
    }
    Ok(())
}

/// What `POST /orchestrate/run` and the chat `run` intent both return. The
/// populated fields depend on `mode`: `pubsub` only ever reaches
/// `"dispatched"`; `http`/`hybrid` may additionally carry `signal`/
/// `decision`/`execStatus` as the synchronous chain progresses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub request_id: Uuid,
    pub trace_id: Uuid,
    pub mode: CommMode,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<RiskDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_status: Option<ExecStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Run acceptance (spec.md §4.8 steps 1-3): `InitDayIfNeeded`, reject with
/// 409 if already halted, mint `requestId`/`traceId`, persist the initial
/// `RunState::Accepted` audit record, then dispatch per `mode`.
pub async fn dispatch_run(
    state: &Arc<AppState>,
    symbol: &str,
    mode: CommMode,
    side: Option<Side>,
    confidence: Option<f64>,
) -> Result<RunOutcome, ApiError> {
    let pnl = qf_kv::pnl::init_day_if_needed(
        &state.pool,
        state.settings.start_equity,
        state.settings.daily_target_pct,
    )
    .await?;
    if pnl.halted {
        return Err(ApiError::conflict(
            "trading halted",
            serde_json::to_value(&pnl).unwrap_or_default(),
        ));
    }

    let request_id = Uuid::new_v4();
    let trace_id = Uuid::new_v4();

    qf_kv::runs::create(
        &state.pool,
        &RunRecord {
            request_id: request_id.to_string(),
            trace_id,
            symbol: symbol.to_string(),
            side,
            confidence,
            mode: mode_str(mode).to_string(),
            state: RunState::Accepted.as_str().to_string(),
        },
    )
    .await
    .context("create orchestrator run record")?;

    advance_run_state(&state.pool, &request_id.to_string(), RunEvent::Dispatched)
        .await
        .context("advance to analyzing")?;

    match mode {
        CommMode::Pubsub => run_async(state, request_id, trace_id, symbol, side, confidence).await,
        CommMode::Http | CommMode::Hybrid => {
            run_sync(state, request_id, trace_id, symbol, mode, side, confidence).await
        }
    }
}

/// `pubsub` mode: append the `Run` command and return immediately (spec.md
/// §4.8: "Asynchronous path: append command to `orchestrator.commands`;
/// immediately 202 with `requestId`").
async fn run_async(
    state: &Arc<AppState>,
    request_id: Uuid,
    trace_id: Uuid,
    symbol: &str,
    side: Option<Side>,
    confidence: Option<f64>,
) -> Result<RunOutcome, ApiError> {
    let command = RunCommand {
        kind: CommandKind::Run,
        request_id,
        symbol: symbol.to_string(),
        mode: CommMode::Pubsub,
        side,
        confidence,
        reason: None,
        trace_id,
        ts: Utc::now(),
    };
    let command_json =
        serde_json::to_value(DataEnvelope::new(command)).context("encode run command")?;
    qf_bus::append(&state.pool, streams::ORCHESTRATOR_COMMANDS, &command_json).await?;

    Ok(RunOutcome {
        request_id,
        trace_id,
        mode: CommMode::Pubsub,
        status: "dispatched".to_string(),
        signal: None,
        decision: None,
        exec_status: None,
        reason: None,
    })
}

/// `http`/`hybrid` mode: block through analyst + risk; `http` additionally
/// blocks through the executor, `hybrid` hands the approved order to
/// `exec.orders` and returns before the fill (spec.md §4.8).
#[allow(clippy::too_many_arguments)]
async fn run_sync(
    state: &Arc<AppState>,
    request_id: Uuid,
    trace_id: Uuid,
    symbol: &str,
    mode: CommMode,
    side: Option<Side>,
    confidence: Option<f64>,
) -> Result<RunOutcome, ApiError> {
    let ids = TraceIds {
        request_id,
        trace_id,
    };
    let timeout = state.settings.inter_service_timeout;

    let signal = client::analyze(
        &state.http,
        &state.siblings.analyst,
        ids,
        timeout,
        client::AnalyzeInput {
            request_id,
            symbol,
            side,
            confidence,
            trace_id,
        },
    )
    .await?;

    advance_run_state(&state.pool, &request_id.to_string(), RunEvent::SignalReceived)
        .await?;

    let decision = client::evaluate_risk(&state.http, &state.siblings.risk, ids, timeout, &signal).await?;

    if !decision.ok {
        advance_run_state(&state.pool, &request_id.to_string(), RunEvent::RiskRejected)
            .await?;
        let reason = decision
            .reason
            .map(|r| r.as_str().to_string())
            .unwrap_or_default();
        emit_risk_rejected(&state.pool, request_id, trace_id, symbol, &reason)
            .await?;
        return Ok(RunOutcome {
            request_id,
            trace_id,
            mode,
            status: "rejected".to_string(),
            signal: Some(signal),
            decision: Some(decision),
            exec_status: None,
            reason: Some(reason),
        });
    }

    // Re-check halted: a concurrent fill may have tripped the latch while
    // this chain was in flight (spec.md §4.8).
    let pnl = qf_kv::pnl::get(&state.pool).await?;
    if pnl.halted {
        advance_run_state(&state.pool, &request_id.to_string(), RunEvent::RiskRejected)
            .await?;
        return Ok(RunOutcome {
            request_id,
            trace_id,
            mode,
            status: "rejected".to_string(),
            signal: Some(signal),
            decision: Some(decision),
            exec_status: None,
            reason: Some("halted".to_string()),
        });
    }

    advance_run_state(&state.pool, &request_id.to_string(), RunEvent::RiskApproved)
        .await?;
    let order = client::order_from_signal(&signal, DEFAULT_ORDER_QTY);

    if mode == CommMode::Hybrid {
        let order_json = serde_json::to_value(DataEnvelope::new(order)).context("encode order")?;
        qf_bus::append(&state.pool, streams::EXEC_ORDERS, &order_json).await?;
        advance_run_state(&state.pool, &request_id.to_string(), RunEvent::OrderSubmitted)
            .await?;
        return Ok(RunOutcome {
            request_id,
            trace_id,
            mode,
            status: "submitted".to_string(),
            signal: Some(signal),
            decision: Some(decision),
            exec_status: None,
            reason: None,
        });
    }

    advance_run_state(&state.pool, &request_id.to_string(), RunEvent::OrderSubmitted)
        .await?;
    let status = client::submit_order(&state.http, &state.siblings.executor, ids, timeout, &order).await?;

    let exec_event = match status.status {
        ExecStatusKind::Filled => RunEvent::ExecFilled,
        ExecStatusKind::Rejected => RunEvent::ExecRejected,
        ExecStatusKind::Failed | ExecStatusKind::Canceled => RunEvent::ExecFailed,
        ExecStatusKind::Pending => RunEvent::ExecFailed,
    };
    advance_run_state(&state.pool, &request_id.to_string(), exec_event)
        .await?;
    apply_fill(&state.pool, &state.settings, &status)
        .await?;

    Ok(RunOutcome {
        request_id,
        trace_id,
        mode,
        status: "submitted".to_string(),
        signal: Some(signal),
        decision: Some(decision),
        exec_status: Some(status),
        reason: None,
    })
}
