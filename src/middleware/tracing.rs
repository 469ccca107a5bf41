use std::time::Instant;

use http::StatusCode;
use tracing::{field, info, info_span};

use super::Middleware;
use crate::ids::RequestId;
use crate::response::ResponseSink;
use crate::router::{Handler, Request};

/// Opens a `request` span around the wrapped handler
///
/// The span carries the method, path and request id (taken from `x-request-id` or
/// freshly generated) and records the final status and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, w: &mut dyn ResponseSink, req: &Request, next: &dyn Handler) {
        let request_id = RequestId::from_headers(req.headers());
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            status = field::Empty,
            latency_us = field::Empty,
        );
        let _entered = span.enter();

        let start = Instant::now();
        next.serve(w, req);
        let latency = start.elapsed();
        let status = w.status().unwrap_or(StatusCode::OK);

        span.record("status", &status.as_u16());
        span.record("latency_us", &(latency.as_micros() as u64));
        info!(status = status.as_u16(), latency_us = latency.as_micros() as u64, "Request completed");
    }
}
