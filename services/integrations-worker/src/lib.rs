//! Integrations broker (C9): a stream-only consumer on `notify.events` that
//! opens tickets / writes knowledge-base pages for `severity=critical`
//! events (spec.md §4.9). No HTTP surface beyond the ambient `/health` and
//! `/metrics` routes — there is no synchronous caller of this service.

pub mod consumer;
pub mod routes;
pub mod state;
