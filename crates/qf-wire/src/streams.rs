//! Stream-name contract (spec.md §6). Every name here is a constant, not a
//! configuration value — workers disagreeing on a stream name would be a
//! wiring bug, not a deployment choice.

pub const ORCHESTRATOR_COMMANDS: &str = "orchestrator.commands";
pub const ANALYSIS_SIGNALS: &str = "analysis.signals";
pub const RISK_REQUESTS: &str = "risk.requests";
pub const RISK_RESPONSES: &str = "risk.responses";
pub const EXEC_ORDERS: &str = "exec.orders";
pub const EXEC_STATUS: &str = "exec.status";
pub const NOTIFY_EVENTS: &str = "notify.events";
pub const OPT_REQUESTS: &str = "opt.requests";
pub const OPT_RESULTS: &str = "opt.results";

/// All primary (non-DLQ) stream names, for admin tooling that needs to
/// enumerate them (e.g. pending-lag inspection across the whole fleet).
pub const ALL: &[&str] = &[
    ORCHESTRATOR_COMMANDS,
    ANALYSIS_SIGNALS,
    RISK_REQUESTS,
    RISK_RESPONSES,
    EXEC_ORDERS,
    EXEC_STATUS,
    NOTIFY_EVENTS,
    OPT_REQUESTS,
    OPT_RESULTS,
];

/// DLQ for `<name>` is `<name>.dlq`.
pub fn dlq_name(stream: &str) -> String {
    format!("{stream}.dlq")
}

/// Consumer group name a given service uses when reading `stream`. Kept as
/// one function so every binary derives the same group deterministically
/// instead of hand-typing a string.
pub fn group_name(service: &str) -> String {
    format!("{service}.group")
}
