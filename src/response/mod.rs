//! # Response Module
//!
//! Response side effects for brrtmux are produced in two places:
//!
//! - **Sinks** ([`ResponseSink`]) are the live response a dispatch writes into. The
//!   transport layer owns the concrete sink; [`BufferedResponse`] is the in-memory one
//!   used by tests and embedders, and [`HeadOnlySink`] wraps another sink to serve HEAD
//!   requests from GET handlers.
//! - **Proxies** ([`ResponseProxy`]) are deferred accumulators. Every unit of work that may
//!   run concurrently (a task middleware, a nested layer) gets its own proxy, and the
//!   dispatcher folds them together with [`merge_proxies`] before touching the sink.
//!
//! ## Merge Rules
//!
//! Given proxies ordered root-first:
//!
//! 1. the first proxy with an error status (>= 400) decides the final status
//! 2. otherwise the first redirect wins
//! 3. otherwise the last explicitly set status wins
//!
//! Headers, cookies and head elements from every proxy are always carried over in order.
//!
//! ## Example
//!
//! ```rust
//! use brrtmux::response::{merge_proxies, BufferedResponse, Disposition, ResponseProxy};
//! use http::StatusCode;
//!
//! let mut layout = ResponseProxy::new();
//! layout.set_status(StatusCode::OK);
//! layout.add_header("x-layout", "root");
//!
//! let mut page = ResponseProxy::new();
//! page.set_status(StatusCode::NOT_FOUND);
//!
//! let merged = merge_proxies(&[layout, page]);
//! let mut res = BufferedResponse::new();
//! assert_eq!(merged.apply(&mut res), Disposition::Halt);
//! assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
//! assert_eq!(res.header("x-layout"), Some("root"));
//! ```

mod proxy;
mod sink;
mod write;

pub use proxy::{
    merge_proxies, Disposition, HeadElement, ResponseProxy, CLIENT_ACCEPTS_REDIRECT_HEADER,
    CLIENT_REDIRECT_HEADER,
};
pub use sink::{BufferedResponse, HeadOnlySink, ResponseSink};
pub use write::{internal_server_error, not_found, write_error, write_json, write_redirect};
