//! Admin control-plane auth (spec.md §6: "admin endpoints require
//! `X-Admin-Token` equal to the token loaded from the secret file path
//! given in config"). DESIGN.md Open Question #4: a plain byte-equality
//! check, not a constant-time comparison — spec.md does not ask for
//! timing-attack hardening and the teacher's own admin-token check
//! (`mqk-cli`) doesn't use one either.

use crate::error::ApiError;
use axum::{extract::Request, middleware::Next, response::Response};
use qf_config::secrets::AdminToken;
use std::sync::Arc;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// `Clone`-able handle to the process's loaded admin token, inserted as an
/// `Extension` so `require_admin_token` can read it without threading it
/// through every handler's state type.
#[derive(Clone)]
pub struct AdminGuard(pub Arc<AdminToken>);

impl AdminGuard {
    pub fn new(token: AdminToken) -> Self {
        AdminGuard(Arc::new(token))
    }
}

pub async fn require_admin_token(req: Request, next: Next) -> Result<Response, ApiError> {
    let guard = req
        .extensions()
        .get::<AdminGuard>()
        .cloned()
        .ok_or(ApiError::Auth)?;

    let supplied = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Auth)?;

    if !guard.0.matches(supplied) {
        return Err(ApiError::Auth);
    }

    Ok(next.run(req).await)
}
