use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::StatusCode;

use super::core::{compose, MiddlewareEntry};
use super::*;
use crate::response::{BufferedResponse, ResponseProxy, ResponseSink};
use crate::router::{Handler, Request};

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Middleware for Recorder {
    fn handle(&self, w: &mut dyn ResponseSink, req: &Request, next: &dyn Handler) {
        self.log.lock().unwrap().push(format!("{}:in", self.name));
        next.serve(w, req);
        self.log.lock().unwrap().push(format!("{}:out", self.name));
    }
}

fn entry(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> MiddlewareEntry {
    MiddlewareEntry {
        mw: Arc::new(Recorder {
            name,
            log: Arc::clone(log),
        }),
        opts: MiddlewareOptions::default(),
    }
}

fn request(path: &str) -> Request {
    http::Request::builder().uri(path).body(Vec::new()).unwrap()
}

#[test]
fn test_compose_orders_scopes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let inner_log = Arc::clone(&log);
    let handler: Arc<dyn Handler> = Arc::new(move |_w: &mut dyn ResponseSink, _req: &Request| {
        inner_log.lock().unwrap().push("handler".to_string());
    });

    let chain = compose(
        handler,
        &[entry("p1", &log), entry("p2", &log)],
        &[entry("m", &log)],
        &[entry("g", &log)],
    );
    chain.serve(&mut BufferedResponse::new(), &request("/"));

    assert_eq!(
        *log.lock().unwrap(),
        vec!["g:in", "m:in", "p1:in", "p2:in", "handler", "p2:out", "p1:out", "m:out", "g:out"]
    );
}

#[test]
fn test_when_predicate_skips_middleware() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut gated = entry("admin", &log);
    gated.opts = MiddlewareOptions::when(|req| req.uri().path().starts_with("/admin"));

    let chain = compose(
        Arc::new(|_w: &mut dyn ResponseSink, _req: &Request| {}),
        &[gated],
        &[],
        &[],
    );
    chain.serve(&mut BufferedResponse::new(), &request("/public"));
    assert!(log.lock().unwrap().is_empty());

    chain.serve(&mut BufferedResponse::new(), &request("/admin/users"));
    assert_eq!(*log.lock().unwrap(), vec!["admin:in", "admin:out"]);
}

struct Deny;

impl Middleware for Deny {
    fn before(&self, _req: &Request) -> Option<ResponseProxy> {
        let mut proxy = ResponseProxy::new();
        proxy.set_status(StatusCode::FORBIDDEN);
        Some(proxy)
    }
}

#[test]
fn test_before_error_short_circuits() {
    let chain = compose(
        Arc::new(|w: &mut dyn ResponseSink, _req: &Request| w.write_body(b"secret")),
        &[MiddlewareEntry {
            mw: Arc::new(Deny),
            opts: MiddlewareOptions::default(),
        }],
        &[],
        &[],
    );
    let mut res = BufferedResponse::new();
    chain.serve(&mut res, &request("/"));
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(res.body_string(), "Forbidden\n");
}

#[test]
fn test_metrics_counts_statuses() {
    let metrics = Arc::new(MetricsMiddleware::new());
    assert_eq!(metrics.average_latency(), Duration::ZERO);

    let req = request("/");
    metrics.after(&req, StatusCode::OK, Duration::from_millis(2));
    metrics.after(&req, StatusCode::NOT_FOUND, Duration::from_millis(4));
    metrics.after(&req, StatusCode::BAD_GATEWAY, Duration::from_millis(6));

    assert_eq!(metrics.request_count(), 3);
    assert_eq!(metrics.client_errors(), 1);
    assert_eq!(metrics.server_errors(), 1);
    assert_eq!(metrics.average_latency(), Duration::from_millis(4));
    assert!(metrics.stack_size() > 0);
}

#[test]
fn test_metrics_through_shared_handle() {
    let metrics = Arc::new(MetricsMiddleware::new());
    let chain = compose(
        Arc::new(|w: &mut dyn ResponseSink, _req: &Request| w.write_status(StatusCode::CREATED)),
        &[MiddlewareEntry {
            mw: Arc::new(Arc::clone(&metrics)),
            opts: MiddlewareOptions::default(),
        }],
        &[],
        &[],
    );
    chain.serve(&mut BufferedResponse::new(), &request("/"));
    chain.serve(&mut BufferedResponse::new(), &request("/"));
    assert_eq!(metrics.request_count(), 2);
    assert_eq!(metrics.client_errors(), 0);
}

#[test]
fn test_tracing_middleware_passes_through() {
    let chain = compose(
        Arc::new(|w: &mut dyn ResponseSink, _req: &Request| {
            w.write_status(StatusCode::ACCEPTED);
            w.write_body(b"ok");
        }),
        &[],
        &[],
        &[MiddlewareEntry {
            mw: Arc::new(TracingMiddleware),
            opts: MiddlewareOptions::default(),
        }],
    );
    let mut res = BufferedResponse::new();
    chain.serve(&mut res, &request("/traced"));
    assert_eq!(res.status_code(), StatusCode::ACCEPTED);
    assert_eq!(res.body_string(), "ok");
}
