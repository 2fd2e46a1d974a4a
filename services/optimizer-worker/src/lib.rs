//! Optimizer worker (C7): `POST /optimize/run`, `GET /optimize/params`,
//! `POST /admin/optimize/approve`, and an `opt.requests` stream consumer
//! that proposes tightened risk parameters after a loss (spec.md §4.7).

pub mod consumer;
pub mod pipeline;
pub mod routes;
pub mod state;
