//! Proposal/backtest generation (C7, spec.md §4.7). spec.md treats the
//! optimizer's internal method as opaque; this crate fixes one deterministic
//! reading (documented as an Open Question resolution in DESIGN.md): tighten
//! `min_confidence` in proportion to recent loss magnitude, and derive a
//! synthetic backtest summary from the same loss history rather than
//! invent an unrelated number generator. No RNG, no wall-clock input.

use qf_wire::{Backtest, RiskParameters};

/// A recent loss observed by the orchestrator's loss-trigger path
/// (spec.md §4.8: "if `profit <= -OPT_MIN_LOSS`"). Always negative.
#[derive(Debug, Clone, Copy)]
pub struct LossSample {
    pub profit: f64,
}

/// Propose a tightened `RiskParameters` and a synthetic backtest summary
/// from the current parameters and recent loss history. Pure: same inputs
/// always produce the same proposal.
pub fn propose(current: &RiskParameters, losses: &[LossSample]) -> (RiskParameters, Backtest) {
    let total_loss: f64 = losses.iter().map(|l| l.profit.min(0.0).abs()).sum();
    let count = losses.len().max(1) as f64;
    let avg_loss = total_loss / count;

    // Tighten min_confidence by a step proportional to average loss
    // magnitude, capped so a single pathological loss can't saturate the
    // parameter to 1.0 in one proposal.
    let step = (avg_loss / 100.0).min(0.2);
    let proposed_min_confidence = (current.min_confidence + step).min(0.95);

    let proposed = RiskParameters {
        min_confidence: proposed_min_confidence,
        ..current.clone()
    };

    let max_dd = losses
        .iter()
        .map(|l| l.profit.min(0.0).abs())
        .fold(0.0_f64, f64::max);

    // Synthetic win_rate/sharpe: deterministic functions of loss density and
    // magnitude, not a real backtest — this optimizer never sees fills that
    // weren't losses, so it cannot compute a true win rate.
    let win_rate = (1.0 - (count / (count + 10.0))).clamp(0.0, 1.0);
    let sharpe = if avg_loss > 0.0 { 1.0 / (1.0 + avg_loss) } else { 1.0 };

    let backtest = Backtest {
        win_rate,
        sharpe,
        max_dd,
    };

    (proposed, backtest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightens_min_confidence_with_losses() {
        let current = RiskParameters {
            min_confidence: 0.5,
            ..Default::default()
        };
        let losses = vec![LossSample { profit: -5.0 }, LossSample { profit: -5.0 }];
        let (proposed, _) = propose(&current, &losses);
        assert!(proposed.min_confidence > current.min_confidence);
    }

    #[test]
    fn never_exceeds_cap() {
        let current = RiskParameters {
            min_confidence: 0.9,
            ..Default::default()
        };
        let losses = vec![LossSample { profit: -10_000.0 }];
        let (proposed, _) = propose(&current, &losses);
        assert!(proposed.min_confidence <= 0.95);
    }

    #[test]
    fn backtest_max_dd_is_largest_loss_magnitude() {
        let current = RiskParameters::default();
        let losses = vec![
            LossSample { profit: -3.0 },
            LossSample { profit: -7.0 },
            LossSample { profit: -1.0 },
        ];
        let (_, backtest) = propose(&current, &losses);
        assert_eq!(backtest.max_dd, 7.0);
    }

    #[test]
    fn deterministic_given_same_inputs() {
        let current = RiskParameters::default();
        let losses = vec![LossSample { profit: -5.0 }];
        let (p1, b1) = propose(&current, &losses);
        let (p2, b2) = propose(&current, &losses);
        assert_eq!(p1.min_confidence, p2.min_confidence);
        assert_eq!(b1.max_dd, b2.max_dd);
    }
}
