//! Request counting and timing.
//!
//! Sits outside every other layer so that responses produced by the
//! framework itself (unknown route, wrong method, body limit, timeout) are
//! recorded alongside handler responses.

use crate::observability::metrics::record_http_request;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Record method, normalized endpoint, status and latency of a request.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}
