use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use tracing::{debug, error};

use super::bound::BoundTask;
use super::ctx::Ctx;
use super::error::TaskError;
use crate::runtime_config::RuntimeConfig;

static STACK_SIZE: Lazy<usize> = Lazy::new(|| RuntimeConfig::from_env().stack_size);

type FirstError = Arc<Mutex<Option<TaskError>>>;

fn record(first: &FirstError, e: TaskError) {
    let mut slot = first.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = Some(e);
    }
}

/// Fan `tasks` out over `may` coroutines and join them all
///
/// Zero tasks succeed immediately and a single task runs inline on the caller. Larger
/// batches run under a child of `ctx` that shares its memo; the first failure cancels
/// that child so tasks that have not started yet return [`TaskError::Cancelled`].
pub(super) fn run_parallel(ctx: &Ctx, tasks: Vec<Box<dyn BoundTask>>) -> Result<(), TaskError> {
    if ctx.is_cancelled() {
        return Err(TaskError::Cancelled);
    }
    match tasks.len() {
        0 => return Ok(()),
        1 => {
            return tasks.into_iter().next().map_or(Ok(()), |task| {
                catch_unwind(AssertUnwindSafe(|| task.run(ctx)))
                    .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)))
            });
        }
        _ => {}
    }

    let batch = ctx.child();
    let first: FirstError = Arc::new(Mutex::new(None));
    let mut handles = Vec::with_capacity(tasks.len());
    let total = tasks.len();

    for (i, task) in tasks.into_iter().enumerate() {
        let unit_ctx = batch.clone();
        let unit_first = Arc::clone(&first);

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns everything it touches (Send + 'static) and every handle is
        // joined below before this function returns.
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .name(format!("brrtmux-task-{i}"))
                .stack_size(*STACK_SIZE)
                .spawn(move || {
                    let result = catch_unwind(AssertUnwindSafe(|| task.run(&unit_ctx)))
                        .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)));
                    if let Err(e) = result {
                        record(&unit_first, e);
                        unit_ctx.cancel();
                    }
                })
        };

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                error!(error = %e, task_index = i, "Failed to spawn task coroutine");
                record(&first, TaskError::Spawn(e.to_string()));
                batch.cancel();
                break;
            }
        }
    }

    for handle in handles {
        if let Err(panic) = handle.join() {
            record(&first, TaskError::from_panic(panic));
        }
    }

    let outcome = first.lock().unwrap_or_else(PoisonError::into_inner).take();
    match outcome {
        Some(e) => {
            debug!(error = %e, total, "Parallel task batch failed");
            Err(e)
        }
        None => Ok(()),
    }
}
