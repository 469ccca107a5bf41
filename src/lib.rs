//! # brrtmux
//!
//! **brrtmux** is a coroutine-powered HTTP request multiplexer for the `may` runtime. It
//! pairs a flat, per-method router with a nested layout router, and runs request-scoped
//! work as memoized tasks fanned out over coroutines.
//!
//! ## Overview
//!
//! - **[`matcher`]** - Pattern compilation, best-match and nested-match lookup
//! - **[`router`]** - Flat router: one matcher per method, middleware, task handlers
//! - **[`nested`]** - Nested router: every matching layout layer runs its task in parallel
//! - **[`tasks`]** - Memoized tasks, task contexts and the parallel fan-out
//! - **[`response`]** - Response proxies, proxy merging and response sinks
//! - **[`middleware`]** - Request-handler middleware (tracing, metrics)
//! - **[`hot_reload`]** - Rebuilding the nested route table from a watched manifest
//! - **[`runtime_config`]** / **[`logging`]** - Environment-driven configuration
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Transport
//!     participant Router
//!     participant Matcher
//!     participant Tasks as Task Fan-out
//!     participant Handler
//!
//!     Transport->>Router: serve(sink, request)
//!     Router->>Router: strip mount root
//!     Router->>Matcher: find_best_match(method, path)
//!     alt No Route Match
//!         Router-->>Transport: not-found handler (404)
//!     end
//!     alt Plain handler, no task middleware
//!         Router->>Handler: cached middleware chain
//!     else General path
//!         Router->>Router: parse input (400 on validation error)
//!         Router->>Tasks: run task middleware in parallel
//!         alt Middleware failed
//!             Tasks-->>Transport: 500 Internal Server Error
//!         end
//!         Tasks-->>Router: response proxies
//!         Router->>Router: merge + apply proxies
//!         alt Error or redirect
//!             Router-->>Transport: stop
//!         end
//!         Router->>Handler: handler (task output as JSON)
//!     end
//!     Handler-->>Transport: response
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use brrtmux::response::{BufferedResponse, ResponseSink};
//! use brrtmux::router::{Request, Router, RouterOptions, TaskHandler};
//! use http::Method;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Greet {
//!     name: String,
//! }
//!
//! let mut router = Router::new(RouterOptions::default());
//! router.register_task_handler(
//!     Method::GET,
//!     "/hello",
//!     TaskHandler::<Greet, String>::new(|_ctx, data| Ok(format!("hello {}", data.input().name))),
//! );
//! router.register_handler(Method::GET, "/health", |w: &mut dyn ResponseSink, _req: &Request| {
//!     w.write_body(b"ok");
//! });
//!
//! let mut res = BufferedResponse::new();
//! let req: Request = http::Request::builder().uri("/hello?name=may").body(Vec::new()).unwrap();
//! router.serve(&mut res, req);
//! assert_eq!(res.body_string(), "\"hello may\"");
//! ```
//!
//! ## Runtime Considerations
//!
//! brrtmux uses the `may` coroutine runtime, not tokio:
//!
//! - Parallel task batches run one coroutine per task
//! - The coroutine stack size is configurable via `BRRTMUX_STACK_SIZE`
//! - Task bodies should use `may`'s blocking facilities for I/O
//!
//! ## Logging
//!
//! All modules emit structured `tracing` events. Applications install a subscriber,
//! e.g. with [`logging::init_logging`].

pub mod error;
pub mod hot_reload;
pub mod ids;
pub mod logging;
pub mod matcher;
pub mod middleware;
pub mod nested;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod tasks;

pub use error::{DispatchError, InputError};
pub use ids::RequestId;
pub use logging::init_logging;
pub use matcher::{Matcher, MatcherOptions, PatternError};
pub use nested::{NestedOptions, NestedRouter};
pub use response::{ResponseProxy, ResponseSink};
pub use router::{ReqData, Router, RouterOptions, TaskHandler, TaskMiddleware};
pub use runtime_config::RuntimeConfig;
pub use tasks::{Ctx, Task, TaskError};
