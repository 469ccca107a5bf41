//! # Router Module
//!
//! Flat request router: one [`Matcher`](crate::matcher::Matcher) and route table per
//! HTTP method, dispatching to either conventional [`Handler`]s or typed
//! [`TaskHandler`]s.
//!
//! ## Dispatch
//!
//! 1. The mount root is stripped from the percent-decoded path.
//! 2. `HEAD` uses explicitly registered `HEAD` routes first, then falls back to the `GET`
//!    route through a [`HeadOnlySink`](crate::response::HeadOnlySink) that keeps status
//!    and headers but drops the body.
//! 3. Plain handlers without task middleware take the **fast path**: the cached
//!    middleware chain runs directly, with no task context or response proxy.
//! 4. Everything else takes the **general path**: a task [`Ctx`](crate::tasks::Ctx) is
//!    created, the task handler's input is parsed (`400` on validation failure), task
//!    middleware runs as one parallel batch and its merged response proxy is applied.
//!    An error or redirect stops there; otherwise the handler runs.
//!
//! ## Middleware order
//!
//! Conventional middleware nests pattern (innermost), method, then global (outermost).
//! Task middleware from all three scopes runs together and only their merged side
//! effects are observable.
//!
//! ## Request-scoped data
//!
//! Handlers read route data from the request with [`get_params`], [`get_param`],
//! [`get_splat_values`] and [`get_tasks_ctx`]. Task handlers get the same data, plus
//! their typed input, through [`ReqData`].

mod context;
mod core;
mod handler;
mod input;
mod req_data;
mod route;

pub use context::{get_param, get_params, get_splat_values, get_tasks_ctx, RouteContext};
pub use core::{RouteBuilder, Router, RouterOptions};
pub use handler::{Handler, Request, SharedRequest};
pub use input::{default_parse_input, ParseInputFn};
pub use req_data::ReqData;
pub use route::{AnyRoute, HandlerKind, Route, TaskHandler, TaskMiddleware};

pub(crate) use req_data::REQ_DATA_POOL;
