use std::any::{type_name, Any};
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use super::bound::{Bound, BoundTask, OutputSlot};
use super::ctx::Ctx;
use super::error::TaskError;

/// Unique identity of a [`Task`]; clones share it
pub type TaskId = u64;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

type TaskFn<I, O> = dyn Fn(&Ctx, &I) -> anyhow::Result<O> + Send + Sync;

/// A memoized unit of work
///
/// Within one [`Ctx`], the body runs at most once per distinct input. Concurrent callers
/// with the same input wait for the first execution and receive its result, including a
/// failure.
pub struct Task<I, O> {
    id: TaskId,
    func: Arc<TaskFn<I, O>>,
}

impl<I, O> Clone for Task<I, O> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            func: Arc::clone(&self.func),
        }
    }
}

impl<I, O> fmt::Debug for Task<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("input", &type_name::<I>())
            .field("output", &type_name::<O>())
            .finish()
    }
}

impl<I, O> Task<I, O>
where
    I: Hash + Eq + Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Ctx, &I) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            func: Arc::new(func),
        }
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Run the task, or return the result memoized in `ctx` for this input
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Cancelled`] when `ctx` was cancelled, or the (memoized)
    /// failure of the task body.
    pub fn run(&self, ctx: &Ctx, input: &I) -> Result<O, TaskError> {
        if ctx.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        let cell = ctx.cell_for::<I, O>(self.id, input);
        let mut slot = cell.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(done) = slot.as_ref() {
            return done.clone();
        }

        let result = match catch_unwind(AssertUnwindSafe(|| (self.func)(ctx, input))) {
            Ok(Ok(_)) if ctx.is_cancelled() => Err(TaskError::Cancelled),
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TaskError::from(e)),
            Err(panic) => Err(TaskError::from_panic(panic)),
        };
        *slot = Some(result.clone());
        result
    }

    /// Pre-bind an input and an output slot for [`Ctx::run_parallel`]
    #[must_use]
    pub fn bind(&self, input: I, slot: &OutputSlot<O>) -> Box<dyn BoundTask> {
        Box::new(Bound {
            task: self.clone(),
            input,
            slot: slot.clone(),
        })
    }
}

/// Type-erased task invocation
pub trait AnyTask: Send + Sync {
    /// Run with a dynamically typed input, returning the boxed output
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InputMismatch`] when `input` is not the task's input type.
    fn run_any(&self, ctx: &Ctx, input: &dyn Any) -> Result<Box<dyn Any + Send>, TaskError>;
}

impl<I, O> AnyTask for Task<I, O>
where
    I: Hash + Eq + Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    fn run_any(&self, ctx: &Ctx, input: &dyn Any) -> Result<Box<dyn Any + Send>, TaskError> {
        let input = input
            .downcast_ref::<I>()
            .ok_or(TaskError::InputMismatch {
                expected: type_name::<I>(),
            })?;
        let out = self.run(ctx, input)?;
        Ok(Box::new(out))
    }
}
