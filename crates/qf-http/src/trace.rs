//! Trace/request id propagation (spec.md §6: every HTTP call carries
//! `X-Request-Id`/`X-Trace-Id`, propagated end-to-end; spec.md §9's
//! "Morgan/Express middlewares" redesign flag: trace and request ids are
//! first-class values carried in context, not thread-local).

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// The pair of correlation ids carried by every request in this fleet:
/// `requestId` is business-unique per end-to-end flow, `traceId` is
/// log-correlation only (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct TraceIds {
    pub request_id: Uuid,
    pub trace_id: Uuid,
}

impl TraceIds {
    fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let request_id = header_uuid(headers, REQUEST_ID_HEADER).unwrap_or_else(Uuid::new_v4);
        let trace_id = header_uuid(headers, TRACE_ID_HEADER).unwrap_or_else(Uuid::new_v4);
        TraceIds {
            request_id,
            trace_id,
        }
    }
}

fn header_uuid(headers: &axum::http::HeaderMap, name: &str) -> Option<Uuid> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TraceIds
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<TraceIds>()
            .copied()
            .unwrap_or_else(|| TraceIds::from_headers(&parts.headers)))
    }
}

/// Middleware: extract or mint `TraceIds` from the inbound request, store
/// them in request extensions (so any handler can pull them via the
/// `TraceIds` extractor), run the request inside a tracing span carrying
/// both ids, then echo the ids back on the response headers so a caller
/// that didn't supply them observes what was assigned.
pub async fn trace_layer(mut req: Request<Body>, next: Next) -> Response {
    let ids = TraceIds::from_headers(req.headers());
    req.extensions_mut().insert(ids);

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let _enter = span.enter();

    let mut response = next.run(req).await;
    insert_header(&mut response, REQUEST_ID_HEADER, ids.request_id);
    insert_header(&mut response, TRACE_ID_HEADER, ids.trace_id);
    response
}

fn insert_header(response: &mut Response, name: &'static str, id: Uuid) {
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(&id.to_string()),
    ) {
        response.headers_mut().insert(name, value);
    }
}

/// Attach the current request's correlation ids to an outbound `reqwest`
/// call to a sibling service, so the chain stays correlated end-to-end
/// (spec.md §6).
pub fn propagate_headers(builder: reqwest::RequestBuilder, ids: &TraceIds) -> reqwest::RequestBuilder {
    builder
        .header(REQUEST_ID_HEADER, ids.request_id.to_string())
        .header(TRACE_ID_HEADER, ids.trace_id.to_string())
}
