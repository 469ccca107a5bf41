use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::StatusCode;

use crate::response::{Disposition, ResponseProxy, ResponseSink};
use crate::router::{Handler, Request};

/// Conventional request-handler middleware
///
/// The default [`handle`](Middleware::handle) runs [`before`](Middleware::before), then
/// the wrapped handler, then [`after`](Middleware::after). Middleware that needs full
/// control (e.g. to hold a span open across the handler) overrides `handle`.
pub trait Middleware: Send + Sync {
    /// Return a proxy to answer the request without calling the wrapped handler
    ///
    /// A returned proxy that applies as a success still lets the handler run, so a
    /// middleware can contribute headers without short-circuiting.
    fn before(&self, _req: &Request) -> Option<ResponseProxy> {
        None
    }

    fn after(&self, _req: &Request, _status: StatusCode, _latency: Duration) {}

    fn handle(&self, w: &mut dyn ResponseSink, req: &Request, next: &dyn Handler) {
        let start = Instant::now();
        if let Some(proxy) = self.before(req) {
            if proxy.apply(w) == Disposition::Halt {
                self.after(req, w.status().unwrap_or(StatusCode::OK), start.elapsed());
                return;
            }
        }
        next.serve(w, req);
        self.after(req, w.status().unwrap_or(StatusCode::OK), start.elapsed());
    }
}

impl<T: Middleware + ?Sized> Middleware for Arc<T> {
    fn before(&self, req: &Request) -> Option<ResponseProxy> {
        (**self).before(req)
    }

    fn after(&self, req: &Request, status: StatusCode, latency: Duration) {
        (**self).after(req, status, latency);
    }

    fn handle(&self, w: &mut dyn ResponseSink, req: &Request, next: &dyn Handler) {
        (**self).handle(w, req, next);
    }
}

/// Per-request gate for a middleware
pub type RequestPredicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Registration options shared by HTTP and task middleware
#[derive(Clone, Default)]
pub struct MiddlewareOptions {
    /// Run the middleware only when this returns `true`; `None` always runs it
    pub when: Option<RequestPredicate>,
}

impl MiddlewareOptions {
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        Self {
            when: Some(Arc::new(predicate)),
        }
    }

    pub(crate) fn applies_to(&self, req: &Request) -> bool {
        self.when.as_ref().map_or(true, |p| p(req))
    }
}

impl fmt::Debug for MiddlewareOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareOptions")
            .field("when", &self.when.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

/// A registered middleware with its options
#[derive(Clone)]
pub(crate) struct MiddlewareEntry {
    pub(crate) mw: Arc<dyn Middleware>,
    pub(crate) opts: MiddlewareOptions,
}

struct Wrapped {
    entry: MiddlewareEntry,
    next: Arc<dyn Handler>,
}

impl Handler for Wrapped {
    fn serve(&self, w: &mut dyn ResponseSink, req: &Request) {
        if self.entry.opts.applies_to(req) {
            self.entry.mw.handle(w, req, self.next.as_ref());
        } else {
            self.next.serve(w, req);
        }
    }
}

/// Wrap `handler` so that pattern middleware is innermost and global middleware is
/// outermost; within a scope the first registered middleware runs first
pub(crate) fn compose(
    handler: Arc<dyn Handler>,
    pattern: &[MiddlewareEntry],
    method: &[MiddlewareEntry],
    global: &[MiddlewareEntry],
) -> Arc<dyn Handler> {
    let mut handler = handler;
    let scopes = pattern
        .iter()
        .rev()
        .chain(method.iter().rev())
        .chain(global.iter().rev());
    for entry in scopes {
        handler = Arc::new(Wrapped {
            entry: entry.clone(),
            next: handler,
        });
    }
    handler
}
