//! Risk evaluation engine (C3, spec.md §4.3). Pure — no IO, no clock access
//! beyond an injected `now`, so the ordered-guard algorithm is exhaustively
//! unit-testable without a KV or HTTP harness, following
//! `mqk_risk::engine::evaluate`'s structure (sanity guards first, then an
//! ordered ladder of rejects, fall through to allow).

mod window;

pub use window::in_trading_window;

use chrono::{DateTime, Utc};
use qf_wire::{RejectReason, RiskDecision, RiskParameters, RiskRequest};

/// Evaluate a `RiskRequest` against the current `RiskParameters`. Order of
/// checks is the contract (spec.md §4.3 steps 2-5): blocked side, trading
/// window, confidence floor, else approve.
pub fn evaluate(params: &RiskParameters, request: &RiskRequest, now: DateTime<Utc>) -> RiskDecision {
    if params.block_sides.contains(&request.side) {
        return reject(request, RejectReason::BlockedSide);
    }

    if let (Some(start), Some(end)) = (params.trading_start_hour, params.trading_end_hour) {
        if !window::in_trading_window(start, end, now) {
            return reject(request, RejectReason::OutsideWindow);
        }
    }

    if request.confidence < params.min_confidence {
        return reject(request, RejectReason::LowConfidence);
    }

    RiskDecision {
        request_id: request.request_id,
        ok: true,
        reason: None,
        trace_id: request.trace_id,
        ts: now,
    }
}

fn reject(request: &RiskRequest, reason: RejectReason) -> RiskDecision {
    RiskDecision {
        request_id: request.request_id,
        ok: false,
        reason: Some(reason),
        trace_id: request.trace_id,
        ts: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qf_wire::Side;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn req(side: Side, confidence: f64) -> RiskRequest {
        RiskRequest {
            request_id: Uuid::nil(),
            symbol: "BTC-USD".to_string(),
            side,
            confidence,
            trace_id: Uuid::nil(),
            ts: Utc::now(),
        }
    }

    fn noon() -> DateTime<Utc> {
        "2026-01-15T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn approves_when_all_checks_pass() {
        let params = RiskParameters {
            min_confidence: 0.5,
            ..Default::default()
        };
        let decision = evaluate(&params, &req(Side::Buy, 0.9), noon());
        assert!(decision.ok);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn rejects_low_confidence() {
        let params = RiskParameters {
            min_confidence: 0.6,
            ..Default::default()
        };
        let decision = evaluate(&params, &req(Side::Buy, 0.3), noon());
        assert!(!decision.ok);
        assert_eq!(decision.reason, Some(RejectReason::LowConfidence));
    }

    #[test]
    fn rejects_blocked_side() {
        let mut block_sides = BTreeSet::new();
        block_sides.insert(Side::Buy);
        let params = RiskParameters {
            min_confidence: 0.0,
            block_sides,
            ..Default::default()
        };
        let decision = evaluate(&params, &req(Side::Buy, 0.9), noon());
        assert_eq!(decision.reason, Some(RejectReason::BlockedSide));
    }

    #[test]
    fn blocked_side_checked_before_confidence() {
        let mut block_sides = BTreeSet::new();
        block_sides.insert(Side::Buy);
        let params = RiskParameters {
            min_confidence: 0.99,
            block_sides,
            ..Default::default()
        };
        // Would also fail low_confidence, but blocked_side must win (order matters).
        let decision = evaluate(&params, &req(Side::Buy, 0.01), noon());
        assert_eq!(decision.reason, Some(RejectReason::BlockedSide));
    }

    #[test]
    fn rejects_outside_trading_window() {
        let params = RiskParameters {
            min_confidence: 0.0,
            trading_start_hour: Some(9),
            trading_end_hour: Some(17),
            ..Default::default()
        };
        let three_am: DateTime<Utc> = "2026-01-15T03:00:00Z".parse().unwrap();
        let decision = evaluate(&params, &req(Side::Buy, 0.9), three_am);
        assert_eq!(decision.reason, Some(RejectReason::OutsideWindow));
    }

    #[test]
    fn approves_inside_trading_window() {
        let params = RiskParameters {
            min_confidence: 0.0,
            trading_start_hour: Some(9),
            trading_end_hour: Some(17),
            ..Default::default()
        };
        let decision = evaluate(&params, &req(Side::Buy, 0.9), noon());
        assert!(decision.ok);
    }

    #[test]
    fn wraparound_window_spans_midnight() {
        let params = RiskParameters {
            min_confidence: 0.0,
            trading_start_hour: Some(22),
            trading_end_hour: Some(4),
            ..Default::default()
        };
        let three_am: DateTime<Utc> = "2026-01-15T03:00:00Z".parse().unwrap();
        let decision = evaluate(&params, &req(Side::Buy, 0.9), three_am);
        assert!(decision.ok);
    }
}
