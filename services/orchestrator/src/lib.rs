//! Orchestrator (C8): HTTP front door, PnL owner, pipeline driver,
//! admin/chat control plane (spec.md §4.8).

pub mod chat;
pub mod client;
pub mod consumer;
pub mod pipeline;
pub mod routes;
pub mod run_state;
pub mod state;
