use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use super::bound::BoundTask;
use super::error::TaskError;
use super::task::TaskId;

/// Memo cell for one (task, input) pair; the mutex serializes the single execution
pub(super) type Cell<O> = may::sync::Mutex<Option<Result<O, TaskError>>>;

struct CacheEntry<O> {
    cell: Arc<Cell<O>>,
    expires_at: Option<Instant>,
}

impl<O> CacheEntry<O> {
    fn is_live(&self, now: Option<Instant>) -> bool {
        match (self.expires_at, now) {
            (Some(expires_at), Some(now)) => now < expires_at,
            _ => true,
        }
    }
}

/// Per-task memo table, stored type-erased in the context
trait MemoTable: Send + Sync {
    fn purge_expired(&mut self, now: Instant) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Table<I, O> {
    entries: HashMap<I, CacheEntry<O>>,
}

impl<I, O> MemoTable for Table<I, O>
where
    I: Hash + Eq + Send + Sync + 'static,
    O: Send + 'static,
{
    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.expires_at.map_or(true, |t| now <= t));
        before - self.entries.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Memo {
    tables: RwLock<HashMap<TaskId, Box<dyn MemoTable>>>,
    ttl: Option<Duration>,
    epoch: Instant,
    /// Nanoseconds since `epoch` of the last expiry sweep
    last_cleanup: AtomicU64,
}

#[derive(Default)]
struct CancelToken {
    cancelled: AtomicBool,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

/// Task execution context
///
/// Holds the memoized result of every (task, input) pair run through it. Cloning is
/// cheap and clones share the memo and the cancellation state. A context usually lives
/// for one request.
#[derive(Clone)]
pub struct Ctx {
    memo: Arc<Memo>,
    cancel: Arc<CancelToken>,
}

impl Default for Ctx {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Ctx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ctx")
            .field("ttl", &self.memo.ttl)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Ctx {
    /// Create a context that caches results until it is dropped
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(None)
    }

    /// Create a context whose cached results expire after `ttl`
    ///
    /// Expired results are re-executed on the next access. Expired entries are removed
    /// lazily, at most once per TTL period. `None` or a zero TTL disables expiry.
    #[must_use]
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            memo: Arc::new(Memo {
                tables: RwLock::new(HashMap::with_capacity(4)),
                ttl: ttl.filter(|t| !t.is_zero()),
                epoch: Instant::now(),
                last_cleanup: AtomicU64::new(0),
            }),
            cancel: Arc::new(CancelToken::default()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.memo.ttl
    }

    /// Cancel this context; running tasks finish, new tasks refuse to start
    pub fn cancel(&self) {
        self.cancel.cancelled.store(true, Ordering::Release);
    }

    /// True when this context or any context it was derived from was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Derive a context sharing the memo whose cancellation does not reach the parent
    #[must_use]
    pub fn child(&self) -> Ctx {
        Ctx {
            memo: Arc::clone(&self.memo),
            cancel: Arc::new(CancelToken {
                cancelled: AtomicBool::new(false),
                parent: Some(Arc::clone(&self.cancel)),
            }),
        }
    }

    /// Run bound tasks in parallel, returning the first error
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Cancelled`] when this context is already cancelled, otherwise
    /// the first error produced by any task.
    pub fn run_parallel(&self, tasks: Vec<Box<dyn BoundTask>>) -> Result<(), TaskError> {
        super::parallel::run_parallel(self, tasks)
    }

    /// Get or create the memo cell for `(task, input)`
    pub(super) fn cell_for<I, O>(&self, task: TaskId, input: &I) -> Arc<Cell<O>>
    where
        I: Hash + Eq + Clone + Send + Sync + 'static,
        O: Send + 'static,
    {
        let now = self.memo.ttl.map(|ttl| {
            let now = Instant::now();
            self.maybe_cleanup(now, ttl);
            now
        });

        {
            let tables = self
                .memo
                .tables
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let entry = tables
                .get(&task)
                .and_then(|t| t.as_any().downcast_ref::<Table<I, O>>())
                .and_then(|t| t.entries.get(input));
            if let Some(entry) = entry {
                if entry.is_live(now) {
                    return Arc::clone(&entry.cell);
                }
            }
        }

        let mut tables = self
            .memo
            .tables
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = tables.entry(task).or_insert_with(|| {
            Box::new(Table::<I, O> {
                entries: HashMap::new(),
            }) as Box<dyn MemoTable>
        });
        let Some(table) = slot.as_any_mut().downcast_mut::<Table<I, O>>() else {
            // ids are unique per task instance, so the table type is fixed
            return Arc::new(Cell::<O>::new(None));
        };

        // another caller may have created or refreshed the entry meanwhile
        if let Some(entry) = table.entries.get(input) {
            if entry.is_live(now) {
                return Arc::clone(&entry.cell);
            }
        }

        let cell = Arc::new(Cell::<O>::new(None));
        table.entries.insert(
            input.clone(),
            CacheEntry {
                cell: Arc::clone(&cell),
                expires_at: now.zip(self.memo.ttl).map(|(n, ttl)| n + ttl),
            },
        );
        cell
    }

    fn maybe_cleanup(&self, now: Instant, ttl: Duration) {
        let elapsed = nanos(now.saturating_duration_since(self.memo.epoch));
        let last = self.memo.last_cleanup.load(Ordering::Acquire);
        if elapsed.saturating_sub(last) < nanos(ttl) {
            return;
        }
        // a single sweeper per period
        if self
            .memo
            .last_cleanup
            .compare_exchange(last, elapsed, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let mut tables = self
            .memo
            .tables
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let removed: usize = tables.values_mut().map(|t| t.purge_expired(now)).sum();
        if removed > 0 {
            debug!(removed, "Purged expired task results");
        }
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
