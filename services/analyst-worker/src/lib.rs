//! Analyst worker (C4): `POST /analysis/analyze` and an `orchestrator.commands`
//! stream consumer, both calling the same `SignalSource` (spec.md §4.4).

pub mod consumer;
pub mod routes;
pub mod state;
pub mod strategy;
