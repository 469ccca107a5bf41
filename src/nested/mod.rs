//! Nested layout router
//!
//! Where the flat [`Router`](crate::router::Router) picks one best route, the
//! [`NestedRouter`] returns every registered pattern on the way to the request path,
//! from the root layout down to the page, and runs the task of each matched layer in a
//! single parallel batch.
//!
//! ```text
//! registered: "", "/blog", "/blog/:slug"
//! GET /blog/my-post
//!   ""            -> site layout task
//!   "/blog"       -> blog layout (pattern only, not run)
//!   "/blog/:slug" -> post task, params {slug: "my-post"}
//! ```
//!
//! Layer failures are isolated: each layer's [`NestedTaskResult`] carries its own value
//! or error, and the caller decides how much of the layout chain to render.

mod core;
mod results;
#[cfg(test)]
mod tests;

pub use core::{NestedOptions, NestedRouter};
pub use results::{NestedTaskResult, NestedTaskResults};
