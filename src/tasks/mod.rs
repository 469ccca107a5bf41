//! # Tasks Module
//!
//! A task is a function from input to output (or an error) that runs at most once per
//! execution context and input, however many times it is invoked during the lifetime of
//! that context. The routers use tasks for per-layer data loading and task middleware.
//!
//! ## Key Types
//!
//! - [`Task`] - a named unit of work, `Fn(&Ctx, &I) -> anyhow::Result<O>`
//! - [`Ctx`] - the execution context holding memoized results
//! - [`BoundTask`] - a task pre-bound to its input and output slot, ready for fan-out
//! - [`OutputSlot`] - where a bound task writes its output
//! - [`AnyTask`] - type-erased invocation
//!
//! ## Parallel Fan-out
//!
//! [`Ctx::run_parallel`] runs a batch of bound tasks, each in its own `may` coroutine.
//! The first failure cancels the batch: tasks that have not started yet refuse to start,
//! and the first error is returned once every coroutine has been joined.
//!
//! ```rust
//! use brrtmux::tasks::{Ctx, OutputSlot, Task};
//!
//! let double = Task::new(|_ctx: &Ctx, n: &u32| Ok(n * 2));
//! let square = Task::new(|_ctx: &Ctx, n: &u32| Ok(n * n));
//!
//! let ctx = Ctx::new();
//! let a = OutputSlot::new();
//! let b = OutputSlot::new();
//! ctx.run_parallel(vec![double.bind(4, &a), square.bind(4, &b)]).unwrap();
//! assert_eq!(a.take(), Some(8));
//! assert_eq!(b.take(), Some(16));
//! ```

mod bound;
mod ctx;
mod error;
mod parallel;
mod task;

pub use bound::{BoundTask, OutputSlot};
pub use ctx::Ctx;
pub use error::TaskError;
pub use task::{AnyTask, Task, TaskId};
