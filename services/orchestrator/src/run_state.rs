//! Per-`requestId` pipeline state machine (spec.md §4.8, SPEC_FULL §4.8:
//! "represented as a Rust enum `RunState` with an explicit transition
//! function ... so 'unreachable states are logged as bugs' becomes a real
//! `IllegalTransition` error variant that is logged via `tracing::error!`
//! and never panics"). Transitions are driven solely by stream events or
//! HTTP responses; nothing here owns a timer.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Accepted,
    Analyzing,
    Evaluating,
    Approved,
    Submitting,
    Rejected,
    Filled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    Dispatched,
    SignalReceived,
    RiskApproved,
    RiskRejected,
    OrderSubmitted,
    ExecFilled,
    ExecRejected,
    ExecFailed,
}

#[derive(Debug, Clone, Copy)]
pub struct IllegalTransition {
    pub from: RunState,
    pub event: RunEvent,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "illegal transition: {:?} cannot handle {:?}",
            self.from, self.event
        )
    }
}

impl std::error::Error for IllegalTransition {}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Accepted => "accepted",
            RunState::Analyzing => "analyzing",
            RunState::Evaluating => "evaluating",
            RunState::Approved => "approved",
            RunState::Submitting => "submitting",
            RunState::Rejected => "rejected",
            RunState::Filled => "filled",
            RunState::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<RunState> {
        Some(match raw {
            "accepted" => RunState::Accepted,
            "analyzing" => RunState::Analyzing,
            "evaluating" => RunState::Evaluating,
            "approved" => RunState::Approved,
            "submitting" => RunState::Submitting,
            "rejected" => RunState::Rejected,
            "filled" => RunState::Filled,
            "failed" => RunState::Failed,
            _ => return None,
        })
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Rejected | RunState::Filled | RunState::Failed)
    }

    /// The state-machine diagram of spec.md §4.8:
    /// `accepted -> analyzing -> evaluating -> {rejected | approved ->
    /// submitting -> {filled | rejected | failed}}`. Anything outside this
    /// diagram (e.g. `approved` reached without first passing through
    /// `evaluating`) returns `IllegalTransition` instead of silently
    /// accepting it or panicking.
    pub fn advance(self, event: RunEvent) -> Result<RunState, IllegalTransition> {
        use RunEvent::*;
        use RunState::*;
        match (self, event) {
            (Accepted, Dispatched) => Ok(Analyzing),
            (Analyzing, SignalReceived) => Ok(Evaluating),
            (Evaluating, RiskApproved) => Ok(Approved),
            (Evaluating, RiskRejected) => Ok(Rejected),
            (Approved, OrderSubmitted) => Ok(Submitting),
            (Submitting, ExecFilled) => Ok(Filled),
            (Submitting, ExecRejected) => Ok(Rejected),
            (Submitting, ExecFailed) => Ok(Failed),
            (from, event) => Err(IllegalTransition { from, event }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_filled() {
        let mut state = RunState::Accepted;
        state = state.advance(RunEvent::Dispatched).unwrap();
        state = state.advance(RunEvent::SignalReceived).unwrap();
        state = state.advance(RunEvent::RiskApproved).unwrap();
        state = state.advance(RunEvent::OrderSubmitted).unwrap();
        state = state.advance(RunEvent::ExecFilled).unwrap();
        assert_eq!(state, RunState::Filled);
        assert!(state.is_terminal());
    }

    #[test]
    fn rejection_at_risk_is_terminal() {
        let state = RunState::Evaluating.advance(RunEvent::RiskRejected).unwrap();
        assert_eq!(state, RunState::Rejected);
        assert!(state.is_terminal());
    }

    #[test]
    fn approved_without_evaluating_is_illegal() {
        let err = RunState::Accepted.advance(RunEvent::RiskApproved).unwrap_err();
        assert_eq!(err.from, RunState::Accepted);
    }

    #[test]
    fn round_trips_through_as_str_and_parse() {
        for state in [
            RunState::Accepted,
            RunState::Analyzing,
            RunState::Evaluating,
            RunState::Approved,
            RunState::Submitting,
            RunState::Rejected,
            RunState::Filled,
            RunState::Failed,
        ] {
            assert_eq!(RunState::parse(state.as_str()), Some(state));
        }
    }
}
