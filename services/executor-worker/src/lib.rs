//! Executor worker (C5): `POST /trade/submit` and an `exec.orders` stream
//! consumer, both calling the single `ExecutionGateway::submit` choke point
//! (spec.md §4.5).

pub mod consumer;
pub mod routes;
pub mod state;
