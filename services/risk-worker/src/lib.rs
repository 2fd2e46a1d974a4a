//! Risk worker (C3): `POST /risk/evaluate` and a `risk.requests` stream
//! consumer, both calling the same pure `qf_risk::evaluate` (spec.md §4.3).

pub mod consumer;
pub mod routes;
pub mod state;
