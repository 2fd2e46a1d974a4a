use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// No service-specific endpoints (spec.md §6 lists none for C9) — just the
/// ambient `/health` and `/metrics` every service carries.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new().with_state(state);
    let router = qf_http::with_ambient_routes(router);
    router.layer(axum::middleware::from_fn(qf_http::trace_layer))
}
