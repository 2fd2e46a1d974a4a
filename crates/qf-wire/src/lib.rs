//! Wire entities shared by every service: the JSON shapes that cross a
//! stream or an HTTP boundary, plus the stream-name contract (§3/§6).
//!
//! Every entity tolerates unknown fields on read (`#[serde(default)]` on
//! optional fields, no `deny_unknown_fields`) and never emits a field that
//! isn't part of the contract below.

pub mod streams;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatusKind {
    Pending,
    Filled,
    Rejected,
    Failed,
    Canceled,
}

impl ExecStatusKind {
    /// Terminal statuses are the set without `pending` (spec.md §3).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecStatusKind::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommMode {
    Http,
    Pubsub,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptJobStatus {
    PendingApproval,
    Approved,
    Rejected,
}

/// Reject reasons a `RiskDecision` can carry. `Allowed` never appears on the
/// wire (`ok: true, reason: None`) but is kept here so `qf-risk` has one type
/// to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    LowConfidence,
    BlockedSide,
    OutsideWindow,
    PositionLimit,
    DailyLossLimit,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::LowConfidence => "low_confidence",
            RejectReason::BlockedSide => "blocked_side",
            RejectReason::OutsideWindow => "outside_window",
            RejectReason::PositionLimit => "position_limit",
            RejectReason::DailyLossLimit => "daily_loss_limit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub request_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub confidence: f64,
    pub trace_id: Uuid,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRequest {
    pub request_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub confidence: f64,
    pub trace_id: Uuid,
    pub ts: DateTime<Utc>,
}

impl From<Signal> for RiskRequest {
    fn from(s: Signal) -> Self {
        RiskRequest {
            request_id: s.request_id,
            symbol: s.symbol,
            side: s.side,
            confidence: s.confidence,
            trace_id: s.trace_id,
            ts: s.ts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskDecision {
    pub request_id: Uuid,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    pub trace_id: Uuid,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub trace_id: Uuid,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecStatus {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub status: ExecStatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
    pub trace_id: Uuid,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Uuid>,
    pub ts: DateTime<Utc>,
}

impl Event {
    pub fn info(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Event {
            event_type: event_type.into(),
            severity: Severity::Info,
            message: Some(message.into()),
            context: None,
            request_id: None,
            trace_id: None,
            ts: Utc::now(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_request_id(mut self, id: Uuid) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_trace_id(mut self, id: Uuid) -> Self {
        self.trace_id = Some(id);
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnLDay {
    pub date: String,
    pub start_equity: f64,
    pub pnl_usd: f64,
    pub pnl_pct: f64,
    pub daily_target_pct: f64,
    pub halted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskParameters {
    pub min_confidence: f64,
    #[serde(default)]
    pub block_sides: BTreeSet<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_start_hour: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_end_hour: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl Default for RiskParameters {
    fn default() -> Self {
        RiskParameters {
            min_confidence: 0.5,
            block_sides: BTreeSet::new(),
            trading_start_hour: None,
            trading_end_hour: None,
            risk_limit: None,
            symbol: None,
        }
    }
}

// `Side` needs `Ord`/`PartialOrd` to live in a `BTreeSet`; derive via a
// stable total order on the two variants (Buy < Sell).
impl PartialOrd for Side {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Side {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backtest {
    pub win_rate: f64,
    pub sharpe: f64,
    #[serde(rename = "maxDD")]
    pub max_dd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptJob {
    pub job_id: Uuid,
    pub status: OptJobStatus,
    pub proposed: RiskParameters,
    pub backtest: Backtest,
    pub trace_id: Uuid,
}

/// What the orchestrator appends to `orchestrator.commands` (spec.md §2
/// data-flow: "Orchestrator writes `orchestrator.commands`"). `Run` carries
/// an optional caller-supplied `side`/`confidence` override — when present,
/// the analyst passes it through unchanged rather than deriving its own
/// (spec.md §4.4: "deterministic given inputs"); `Halt` is an audit-trail
/// entry only, never consumed by the analyst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Run,
    Halt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCommand {
    pub kind: CommandKind,
    pub request_id: Uuid,
    pub symbol: String,
    pub mode: CommMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub trace_id: Uuid,
    pub ts: DateTime<Utc>,
}

/// What the orchestrator appends to `opt.requests` on the loss-trigger path
/// (spec.md §4.8: "if `profit <= -OPT_MIN_LOSS` ... append an `opt.requests`
/// entry"). One entry carries one observed loss; the optimizer-worker folds
/// it into `qf_optimizer::propose`'s loss history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptRequest {
    pub symbol: String,
    pub profit: f64,
    pub trace_id: Uuid,
    pub ts: DateTime<Utc>,
}

/// Envelope wrapping every entity when it crosses `qf-bus`: the wire
/// contract is a single field named `data` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        DataEnvelope { data }
    }
}
