//! Ambient HTTP stack shared by every service with an axum surface
//! (spec.md §9's "Morgan/Express middlewares" redesign flag — "abstracted
//! as a request-logging and trace-propagation filter chain"; spec.md §6's
//! `X-Request-Id`/`X-Trace-Id` header contract; spec.md §7's error
//! taxonomy). One crate so the eight HTTP-facing services don't each grow
//! their own copy.

pub mod admin;
pub mod error;
pub mod metrics_route;
pub mod trace;

pub use admin::{require_admin_token, AdminGuard};
pub use error::ApiError;
pub use metrics_route::{install_prometheus, metrics_handler};
pub use trace::{propagate_headers, trace_layer, TraceIds};

use axum::{response::IntoResponse, routing::get, Router};

async fn health() -> impl IntoResponse {
    "ok"
}

/// Mount the endpoints every service carries regardless of its own surface
/// (spec.md SPEC_FULL §6: `GET /health` liveness, `GET /metrics` Prometheus
/// exposition).
pub fn with_ambient_routes<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
}
