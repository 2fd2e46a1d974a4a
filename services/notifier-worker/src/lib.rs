//! Notifier worker (C6): `POST /notify`, `GET /notify/recent`,
//! `POST /admin/notify/ack`, and a `notify.events` stream consumer that fans
//! out to severity-routed webhooks (spec.md §4.6).

pub mod consumer;
pub mod routes;
pub mod state;
