//! `ApiError` — spec.md §7's error taxonomy mapped onto axum. Hand-rolled
//! enum with a manual `Display`/`Error` impl (as `mqk_execution::gateway::GateRefusal`
//! and `mqk_portfolio::ledger::LedgerError` do; this workspace does not use
//! `thiserror`, matching the teacher's own choice). Never leaks a `Debug`
//! dump of an inner `anyhow::Error` to the client — only a stable code and
//! a short human message (spec.md §7: "never leak secrets or stack traces").

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// 400 — bad input, never retried.
    Validation(String),
    /// 401 — missing/invalid admin token, never retried.
    Auth,
    /// 404 — resource not found (e.g. an unknown DLQ entry id).
    NotFound(String),
    /// 409 — halted or otherwise conflicting with current state. `extra`
    /// carries caller-supplied context (e.g. the current `PnLDay` snapshot).
    Conflict {
        message: String,
        extra: serde_json::Value,
    },
    /// 502 — a sibling service call failed or timed out.
    DownstreamDegraded(String),
    /// 500 — anything else. The inner error is logged, never serialized.
    Internal(anyhow::Error),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Validation(m) => write!(f, "validation: {m}"),
            ApiError::Auth => write!(f, "auth: missing or invalid admin token"),
            ApiError::NotFound(m) => write!(f, "not_found: {m}"),
            ApiError::Conflict { message, .. } => write!(f, "conflict: {message}"),
            ApiError::DownstreamDegraded(m) => write!(f, "downstream_degraded: {m}"),
            ApiError::Internal(e) => write!(f, "internal: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl ApiError {
    pub fn conflict(message: impl Into<String>, extra: serde_json::Value) -> Self {
        ApiError::Conflict {
            message: message.into(),
            extra,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Auth => "unauthenticated",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict { .. } => "conflict",
            ApiError::DownstreamDegraded(_) => "downstream_degraded",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::DownstreamDegraded(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            tracing::error!(error = %e, "internal error");
        }
        let status = self.status();
        let code = self.code();
        let message = match &self {
            ApiError::Validation(m) | ApiError::NotFound(m) | ApiError::DownstreamDegraded(m) => {
                m.clone()
            }
            ApiError::Conflict { message, .. } => message.clone(),
            ApiError::Auth => "unauthenticated".to_string(),
            ApiError::Internal(_) => "internal error".to_string(),
        };

        let mut body = json!({ "code": code, "message": message });
        if let ApiError::Conflict { extra, .. } = self {
            if let (Some(obj), Some(extra_obj)) = (body.as_object_mut(), extra.as_object()) {
                for (k, v) in extra_obj {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }

        (status, Json(body)).into_response()
    }
}
