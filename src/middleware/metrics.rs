use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use http::StatusCode;

use super::Middleware;
use crate::router::Request;

/// Middleware counting requests, latency and error responses
///
/// All counters are atomics updated with `Ordering::Relaxed`; readings are eventually
/// consistent. Share one instance between the router and a reporter by registering an
/// `Arc<MetricsMiddleware>`.
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    client_errors: AtomicUsize,
    server_errors: AtomicUsize,
    stack_size: AtomicUsize,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of requests that completed
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean request latency; zero before the first request
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Responses with a 4xx status
    pub fn client_errors(&self) -> usize {
        self.client_errors.load(Ordering::Relaxed)
    }

    /// Responses with a 5xx status
    pub fn server_errors(&self) -> usize {
        self.server_errors.load(Ordering::Relaxed)
    }

    /// Stack size of the coroutine that served the latest request, or the configured
    /// default outside a coroutine
    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }
}

impl Middleware for MetricsMiddleware {
    fn after(&self, _req: &Request, status: StatusCode, latency: Duration) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        if status.is_client_error() {
            self.client_errors.fetch_add(1, Ordering::Relaxed);
        } else if status.is_server_error() {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        }

        let size = if may::coroutine::is_coroutine() {
            may::coroutine::current().stack_size()
        } else {
            may::config().get_stack_size()
        };
        self.stack_size.store(size, Ordering::Relaxed);
    }
}
