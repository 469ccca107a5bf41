use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use super::ctx::Ctx;
use super::error::TaskError;
use super::task::Task;

/// A task pre-bound to its input and output destination
///
/// Closures `Fn(&Ctx) -> Result<(), TaskError>` are bound tasks too, which lets callers
/// schedule work that is not a [`Task`] in the same batch.
pub trait BoundTask: Send {
    fn run(&self, ctx: &Ctx) -> Result<(), TaskError>;
}

impl<F> BoundTask for F
where
    F: Fn(&Ctx) -> Result<(), TaskError> + Send,
{
    fn run(&self, ctx: &Ctx) -> Result<(), TaskError> {
        self(ctx)
    }
}

/// Shared destination for a bound task's output
#[derive(Debug)]
pub struct OutputSlot<O> {
    value: Arc<Mutex<Option<O>>>,
}

impl<O> Clone for OutputSlot<O> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<O> Default for OutputSlot<O> {
    fn default() -> Self {
        Self {
            value: Arc::new(Mutex::new(None)),
        }
    }
}

impl<O> OutputSlot<O> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: O) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    /// Move the output out, leaving the slot empty
    pub fn take(&self) -> Option<O> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<O: Clone> OutputSlot<O> {
    #[must_use]
    pub fn get(&self) -> Option<O> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub(super) struct Bound<I, O> {
    pub(super) task: Task<I, O>,
    pub(super) input: I,
    pub(super) slot: OutputSlot<O>,
}

impl<I, O> BoundTask for Bound<I, O>
where
    I: Hash + Eq + Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    fn run(&self, ctx: &Ctx) -> Result<(), TaskError> {
        let out = self.task.run(ctx, &self.input)?;
        self.slot.set(out);
        Ok(())
    }
}
