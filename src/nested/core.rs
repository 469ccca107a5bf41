use std::borrow::Cow;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::results::{NestedTaskResult, NestedTaskResults};
use crate::matcher::{Matcher, MatcherOptions, NestedMatches, PatternError, RegisteredPattern};
use crate::response::ResponseProxy;
use crate::router::{get_tasks_ctx, SharedRequest, TaskHandler, REQ_DATA_POOL};
use crate::router::ReqData;
use crate::runtime_config::RuntimeConfig;
use crate::tasks::{BoundTask, Ctx, OutputSlot, TaskError};

/// Nested router configuration
#[derive(Debug, Clone)]
pub struct NestedOptions {
    pub matcher: MatcherOptions,
    pub runtime: RuntimeConfig,
}

impl Default for NestedOptions {
    fn default() -> Self {
        Self {
            matcher: MatcherOptions::default(),
            runtime: RuntimeConfig::from_env(),
        }
    }
}

/// A layer task with its output already turned into a structured value
trait LayerHandler: Send + Sync {
    fn run(&self, ctx: &Ctx, data: &mut ReqData<()>) -> anyhow::Result<Value>;
}

impl<O> LayerHandler for TaskHandler<(), O>
where
    O: Serialize + Send + Sync + 'static,
{
    fn run(&self, ctx: &Ctx, data: &mut ReqData<()>) -> anyhow::Result<Value> {
        let output = self.call(ctx, data)?;
        Ok(serde_json::to_value(output)?)
    }
}

#[derive(Clone)]
struct CompiledEntry {
    pattern: Arc<RegisteredPattern>,
    handler: Option<Arc<dyn LayerHandler>>,
}

/// Immutable route table; replaced wholesale on every registration
struct Snapshot {
    matcher: Matcher,
    entries: Vec<CompiledEntry>,
    /// normalized pattern to entry position
    index: HashMap<String, usize>,
}

impl Snapshot {
    fn entry(&self, pattern: &RegisteredPattern) -> Option<&CompiledEntry> {
        self.index
            .get(pattern.normalized_pattern())
            .and_then(|&i| self.entries.get(i))
    }

    fn has_shape(&self, shape: &str) -> bool {
        self.entries.iter().any(|e| e.pattern.shape() == shape)
    }

    fn entry_for(&self, raw: &str) -> Option<&CompiledEntry> {
        let compiled = self.matcher.compile(raw).ok()?;
        self.entry(&compiled)
    }
}

/// What one layer produced inside the fan-out
struct LayerOutcome {
    data: Option<Value>,
    error: Option<TaskError>,
    proxy: ResponseProxy,
}

/// Router for nested layouts: every pattern on the path to the request matches, and
/// each matched layer's task runs in one parallel batch
///
/// Dispatch reads a snapshot without locking. Registration and
/// [`rebuild_preserving_handlers`](NestedRouter::rebuild_preserving_handlers) publish a
/// new snapshot; requests already holding the old one are unaffected.
pub struct NestedRouter {
    snapshot: ArcSwap<Snapshot>,
    write_lock: Mutex<()>,
    opts: NestedOptions,
}

impl Default for NestedRouter {
    fn default() -> Self {
        Self::new(NestedOptions::default())
    }
}

impl std::fmt::Debug for NestedRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestedRouter")
            .field("patterns", &self.all_patterns())
            .field("opts", &self.opts)
            .finish()
    }
}

impl NestedRouter {
    #[must_use]
    pub fn new(opts: NestedOptions) -> Self {
        let matcher = Matcher::new(MatcherOptions {
            quiet: true,
            ..opts.matcher.clone()
        });
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot {
                matcher,
                entries: Vec::new(),
                index: HashMap::new(),
            }),
            write_lock: Mutex::new(()),
            opts,
        }
    }

    /// Register a layer whose task contributes data
    ///
    /// # Panics
    ///
    /// Panics when the pattern is malformed or already registered.
    pub fn register_task_handler<O>(&self, pattern: &str, handler: TaskHandler<(), O>)
    where
        O: Serialize + Send + Sync + 'static,
    {
        if let Err(e) = self.try_register_task_handler(pattern, handler) {
            panic!("{e}");
        }
    }

    /// # Errors
    ///
    /// Returns [`PatternError`] when the pattern is malformed or already registered,
    /// param names aside.
    pub fn try_register_task_handler<O>(
        &self,
        pattern: &str,
        handler: TaskHandler<(), O>,
    ) -> Result<(), PatternError>
    where
        O: Serialize + Send + Sync + 'static,
    {
        self.try_insert(pattern, Some(Arc::new(handler)))
    }

    /// Register a pattern-only layer, e.g. a layout without data
    ///
    /// # Panics
    ///
    /// Panics when the pattern is malformed or already registered.
    pub fn register_pattern(&self, pattern: &str) {
        if let Err(e) = self.try_register_pattern(pattern) {
            panic!("{e}");
        }
    }

    /// # Errors
    ///
    /// Returns [`PatternError`] when the pattern is malformed or already registered.
    pub fn try_register_pattern(&self, pattern: &str) -> Result<(), PatternError> {
        self.try_insert(pattern, None)
    }

    fn try_insert(
        &self,
        pattern: &str,
        handler: Option<Arc<dyn LayerHandler>>,
    ) -> Result<(), PatternError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot.load();

        let compiled = current.matcher.compile(pattern)?;
        if current.has_shape(compiled.shape()) {
            return Err(PatternError::Duplicate(pattern.to_string()));
        }

        let mut matcher = current.matcher.clone();
        let rp = matcher.try_register_pattern(pattern)?;
        let mut entries = current.entries.clone();
        let mut index = current.index.clone();
        index.insert(rp.normalized_pattern().to_string(), entries.len());

        debug!(
            pattern = %pattern,
            normalized = %rp.normalized_pattern(),
            has_task = handler.is_some(),
            "Nested pattern registered"
        );
        entries.push(CompiledEntry {
            pattern: rp,
            handler,
        });

        self.snapshot.store(Arc::new(Snapshot {
            matcher,
            entries,
            index,
        }));
        Ok(())
    }

    #[must_use]
    pub fn is_registered(&self, pattern: &str) -> bool {
        self.snapshot.load().entry_for(pattern).is_some()
    }

    #[must_use]
    pub fn has_task_handler(&self, pattern: &str) -> bool {
        self.snapshot
            .load()
            .entry_for(pattern)
            .is_some_and(|e| e.handler.is_some())
    }

    /// Registered patterns in registration order
    #[must_use]
    pub fn all_patterns(&self) -> Vec<String> {
        self.snapshot
            .load()
            .entries
            .iter()
            .map(|e| e.pattern.original_pattern().to_string())
            .collect()
    }

    /// Every registered pattern that applies to `path`, outermost first
    #[must_use]
    pub fn find_nested_matches(&self, path: &str) -> Option<NestedMatches> {
        self.snapshot.load().matcher.find_nested_matches(path)
    }

    /// Run the task of every matched layer as one parallel batch
    ///
    /// A failing layer only affects its own result. Layers whose pattern is no longer
    /// registered, or that never had a task, are reported as not run.
    pub fn run_nested_tasks(
        &self,
        ctx: &Ctx,
        req: &SharedRequest,
        matches: &NestedMatches,
    ) -> NestedTaskResults {
        let snapshot = self.snapshot.load_full();
        run_layers(&snapshot, ctx, req, matches)
    }

    /// Match the request path and run the matched layers
    ///
    /// Uses the request's task context when the router attached one, otherwise a new
    /// context. Returns `None` when nothing matches.
    #[must_use]
    pub fn find_and_run(&self, req: &SharedRequest) -> Option<NestedTaskResults> {
        let snapshot = self.snapshot.load_full();
        let raw = req.uri().path();
        let path = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
        let matches = snapshot.matcher.find_nested_matches(&path)?;

        let ctx = match get_tasks_ctx(req) {
            Some(ctx) => ctx.clone(),
            None => Ctx::with_ttl(self.opts.runtime.task_ttl),
        };
        Some(run_layers(&snapshot, &ctx, req, &matches))
    }

    /// Replace the pattern-only layers with `patterns`, keeping every layer with a task
    ///
    /// Patterns that collide with a task layer are skipped. On error the current table
    /// stays in place.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] for the first malformed pattern.
    pub fn rebuild_preserving_handlers<S: AsRef<str>>(
        &self,
        patterns: &[S],
    ) -> Result<(), PatternError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot.load();

        let mut matcher = Matcher::new(MatcherOptions {
            quiet: true,
            ..self.opts.matcher.clone()
        });
        let mut entries = Vec::with_capacity(current.entries.len() + patterns.len());
        let mut index = HashMap::with_capacity(entries.capacity());

        for kept in current.entries.iter().filter(|e| e.handler.is_some()) {
            let rp = matcher.try_register_pattern(kept.pattern.original_pattern())?;
            index.insert(rp.normalized_pattern().to_string(), entries.len());
            entries.push(CompiledEntry {
                pattern: rp,
                handler: kept.handler.clone(),
            });
        }
        let task_layers = entries.len();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let compiled = matcher.compile(pattern)?;
            if entries
                .iter()
                .any(|e| e.pattern.shape() == compiled.shape())
            {
                continue;
            }
            let rp = matcher.try_register_pattern(pattern)?;
            index.insert(rp.normalized_pattern().to_string(), entries.len());
            entries.push(CompiledEntry {
                pattern: rp,
                handler: None,
            });
        }

        info!(
            task_layers,
            pattern_layers = entries.len() - task_layers,
            "Nested route table rebuilt"
        );
        self.snapshot.store(Arc::new(Snapshot {
            matcher,
            entries,
            index,
        }));
        Ok(())
    }
}

fn run_layers(
    snapshot: &Snapshot,
    ctx: &Ctx,
    req: &SharedRequest,
    matches: &NestedMatches,
) -> NestedTaskResults {
    let params = Arc::new(matches.params.clone());
    let splat_values: Arc<[String]> = matches.splat_values.clone().into();

    let mut slots: Vec<Option<OutputSlot<LayerOutcome>>> = Vec::with_capacity(matches.matches.len());
    let mut batch: Vec<Box<dyn BoundTask>> = Vec::new();

    for matched in &matches.matches {
        let Some(handler) = snapshot.entry(matched).and_then(|e| e.handler.clone()) else {
            slots.push(None);
            continue;
        };
        let out = OutputSlot::new();
        slots.push(Some(out.clone()));

        let params = Arc::clone(&params);
        let splat_values = Arc::clone(&splat_values);
        let req = Arc::clone(req);
        batch.push(Box::new(move |ctx: &Ctx| -> Result<(), TaskError> {
            let mut data = REQ_DATA_POOL.checkout();
            data.populate(
                Arc::clone(&params),
                Arc::clone(&splat_values),
                Some(ctx.clone()),
                Arc::clone(&req),
            );
            let result = catch_unwind(AssertUnwindSafe(|| handler.run(ctx, &mut data)))
                .unwrap_or_else(|panic| Err(TaskError::from_panic(panic).into()));
            let outcome = match result {
                Ok(value) => LayerOutcome {
                    data: Some(value),
                    error: None,
                    proxy: data.take_response_proxy(),
                },
                Err(e) => LayerOutcome {
                    data: None,
                    error: Some(TaskError::from(e)),
                    proxy: data.take_response_proxy(),
                },
            };
            out.set(outcome);
            // failures stay in the layer's slot so siblings keep running
            Ok(())
        }));
    }

    if let Err(e) = ctx.run_parallel(batch) {
        warn!(error = %e, "Nested layer batch did not run");
    }

    let mut results = Vec::with_capacity(slots.len());
    let mut proxies = Vec::with_capacity(slots.len());
    for (matched, slot) in matches.matches.iter().zip(slots) {
        let pattern = matched.original_pattern().to_string();
        let Some(slot) = slot else {
            results.push(NestedTaskResult::skipped(pattern));
            proxies.push(ResponseProxy::new());
            continue;
        };
        let outcome = slot.take().unwrap_or(LayerOutcome {
            data: None,
            error: Some(TaskError::Cancelled),
            proxy: ResponseProxy::new(),
        });
        if let Some(e) = &outcome.error {
            warn!(pattern = %pattern, error = %e, "Nested layer task failed");
        }
        results.push(NestedTaskResult {
            pattern,
            data: outcome.data,
            error: outcome.error,
            ran_task: true,
        });
        proxies.push(outcome.proxy);
    }

    NestedTaskResults::new(
        matches.params.clone(),
        matches.splat_values.clone(),
        results,
        proxies,
    )
}
