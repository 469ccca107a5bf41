//! Conventional request-handler middleware
//!
//! A [`Middleware`] wraps a [`Handler`](crate::router::Handler). The router nests
//! middleware from the pattern scope (innermost) through the method scope to the global
//! scope (outermost); each registration may be gated per request with
//! [`MiddlewareOptions::when`].

mod core;
mod metrics;
mod tracing;
#[cfg(test)]
mod tests;

pub use core::{Middleware, MiddlewareOptions, RequestPredicate};
pub use metrics::MetricsMiddleware;
pub use tracing::TracingMiddleware;

pub(crate) use core::{compose, MiddlewareEntry};
