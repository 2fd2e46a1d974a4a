//! Prometheus exposition (SPEC_FULL §2 "Observability": `metrics` +
//! `metrics-exporter-prometheus`, exposed at `GET /metrics` on every
//! HTTP-facing service, pulled in from `cooprefr-bettersys/rust-backend` —
//! the only pack repo that carries a Prometheus exporter).

use axum::extract::Extension;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global recorder once per process and return the handle used
/// to render `/metrics`. Call this before any `metrics::gauge!`/`counter!`
/// call in the process, i.e. first thing in `main`.
pub fn install_prometheus() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("install prometheus recorder (must only be called once per process)")
}

pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
