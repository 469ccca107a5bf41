use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::context::RouteContext;
use super::handler::{Handler, Request, SharedRequest};
use super::input::ParseInputFn;
use super::req_data::REQ_DATA_POOL;
use super::route::{
    AnyRoute, DispatchScope, HandlerKind, Route, TaskEndpoint, TaskHandler, TaskMiddleware,
};
use crate::error::DispatchError;
use crate::matcher::{BestMatch, Matcher, MatcherOptions, Params, PatternError, RegisteredPattern};
use crate::middleware::{compose, Middleware, MiddlewareEntry, MiddlewareOptions};
use crate::response::{
    merge_proxies, not_found, write_error, Disposition, HeadOnlySink, ResponseProxy, ResponseSink,
};
use crate::runtime_config::RuntimeConfig;
use crate::tasks::{BoundTask, Ctx, OutputSlot, TaskError};

/// Programmatic router configuration
#[derive(Clone)]
pub struct RouterOptions {
    /// Path prefix stripped from every request before matching, e.g. `/app`
    pub mount_root: String,
    pub dynamic_param_prefix: char,
    pub splat_segment: char,
    /// Segment that marks an index pattern; empty means trailing-slash indexes
    pub explicit_index_segment: String,
    /// Replaces [`default_parse_input`](super::default_parse_input) for task handlers
    pub parse_input: Option<ParseInputFn>,
    pub runtime: RuntimeConfig,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            mount_root: String::new(),
            dynamic_param_prefix: ':',
            splat_segment: '*',
            explicit_index_segment: String::new(),
            parse_input: None,
            runtime: RuntimeConfig::from_env(),
        }
    }
}

impl fmt::Debug for RouterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterOptions")
            .field("mount_root", &self.mount_root)
            .field("dynamic_param_prefix", &self.dynamic_param_prefix)
            .field("splat_segment", &self.splat_segment)
            .field("explicit_index_segment", &self.explicit_index_segment)
            .field("parse_input", &self.parse_input.as_ref().map(|_| "<custom>"))
            .field("runtime", &self.runtime)
            .finish()
    }
}

#[derive(Clone)]
struct TaskMiddlewareEntry {
    mw: TaskMiddleware,
    opts: MiddlewareOptions,
}

enum Endpoint {
    Http(Arc<dyn Handler>),
    Task(Arc<dyn TaskEndpoint>),
}

struct RouteSlot {
    info: Arc<dyn AnyRoute>,
    endpoint: Endpoint,
    http_mws: Vec<MiddlewareEntry>,
    task_mws: Vec<TaskMiddlewareEntry>,
    needs_tasks_ctx: bool,
    /// Fully wrapped handler chain of an HTTP route, built on first dispatch
    chain: OnceCell<Arc<dyn Handler>>,
}

struct MethodTable {
    matcher: Matcher,
    routes: HashMap<String, RouteSlot>,
    http_mws: Vec<MiddlewareEntry>,
    task_mws: Vec<TaskMiddlewareEntry>,
}

impl MethodTable {
    fn new(opts: MatcherOptions) -> Self {
        Self {
            matcher: Matcher::new(opts),
            routes: HashMap::new(),
            http_mws: Vec::new(),
            task_mws: Vec::new(),
        }
    }

    fn reset_chains(&mut self) {
        for slot in self.routes.values_mut() {
            slot.chain = OnceCell::new();
        }
    }
}

/// Handle to a freshly registered route for attaching pattern-level options
pub struct RouteBuilder<'r> {
    slot: &'r mut RouteSlot,
}

impl RouteBuilder<'_> {
    /// Wrap this route's handler; pattern middleware runs inside method and global
    /// middleware
    pub fn with_middleware(self, mw: impl Middleware + 'static, opts: MiddlewareOptions) -> Self {
        self.slot.http_mws.push(MiddlewareEntry {
            mw: Arc::new(mw),
            opts,
        });
        self.slot.chain = OnceCell::new();
        self
    }

    pub fn with_task_middleware(self, mw: TaskMiddleware, opts: MiddlewareOptions) -> Self {
        self.slot.task_mws.push(TaskMiddlewareEntry { mw, opts });
        self
    }

    /// Always dispatch through the task path so the handler can reach the task
    /// context via [`get_tasks_ctx`](super::get_tasks_ctx)
    pub fn needs_tasks_ctx(self) -> Self {
        self.slot.needs_tasks_ctx = true;
        self
    }

    #[must_use]
    pub fn route(&self) -> &Arc<dyn AnyRoute> {
        &self.slot.info
    }
}

/// Flat router with one matcher and route table per HTTP method
///
/// Registration takes `&mut self`, dispatch takes `&self`: build the router, then share
/// it (e.g. behind an `Arc`) with the serving coroutines.
///
/// ```
/// use brrtmux::response::{BufferedResponse, ResponseSink};
/// use brrtmux::router::{get_param, Request, Router, RouterOptions};
/// use http::Method;
///
/// let mut router = Router::new(RouterOptions::default());
/// router.register_handler(Method::GET, "/users/:id", |w: &mut dyn ResponseSink, req: &Request| {
///     let id = get_param(req, "id").unwrap_or_default();
///     w.write_body(format!("user {id}").as_bytes());
/// });
///
/// let mut res = BufferedResponse::new();
/// let req = http::Request::builder().uri("/users/42").body(Vec::new()).unwrap();
/// router.serve(&mut res, req);
/// assert_eq!(res.body_string(), "user 42");
/// ```
pub struct Router {
    opts: RouterOptions,
    mount_root: String,
    methods: HashMap<Method, MethodTable>,
    global_http_mws: Vec<MiddlewareEntry>,
    global_task_mws: Vec<TaskMiddlewareEntry>,
    not_found: Arc<dyn Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterOptions::default())
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("mount_root", &self.mount_root)
            .field("routes", &self.all_routes())
            .finish_non_exhaustive()
    }
}

fn normalize_mount_root(root: &str) -> String {
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}/")
    }
}

impl Router {
    #[must_use]
    pub fn new(opts: RouterOptions) -> Self {
        let mount_root = normalize_mount_root(&opts.mount_root);
        Self {
            opts,
            mount_root,
            methods: HashMap::new(),
            global_http_mws: Vec::new(),
            global_task_mws: Vec::new(),
            not_found: Arc::new(|w: &mut dyn ResponseSink, _req: &Request| not_found(w)),
        }
    }

    /// Normalized mount root: empty, or a path with leading and trailing slashes
    #[must_use]
    pub fn mount_root(&self) -> &str {
        &self.mount_root
    }

    /// Join a pattern under the mount root, e.g. `/app/` + `/users` is `/app/users`
    #[must_use]
    pub fn mount_root_with(&self, pattern: &str) -> String {
        if self.mount_root.is_empty() {
            return pattern.to_string();
        }
        format!("{}{}", self.mount_root, pattern.trim_start_matches('/'))
    }

    fn matcher_options(&self) -> MatcherOptions {
        MatcherOptions {
            dynamic_param_prefix: self.opts.dynamic_param_prefix,
            splat_segment: self.opts.splat_segment,
            explicit_index_segment: self.opts.explicit_index_segment.clone(),
            quiet: true,
        }
    }

    fn table_mut(&mut self, method: Method) -> &mut MethodTable {
        let opts = self.matcher_options();
        self.methods
            .entry(method)
            .or_insert_with(|| MethodTable::new(opts))
    }

    fn try_insert(
        &mut self,
        method: Method,
        pattern: &str,
        kind: HandlerKind,
        endpoint: Endpoint,
        info: impl FnOnce(Method, Arc<RegisteredPattern>) -> Arc<dyn AnyRoute>,
    ) -> Result<RouteBuilder<'_>, PatternError> {
        let table = self.table_mut(method.clone());
        let compiled = table.matcher.compile(pattern)?;
        let key = compiled.normalized_pattern().to_string();
        if table
            .routes
            .values()
            .any(|slot| slot.info.pattern().shape() == compiled.shape())
        {
            return Err(PatternError::Duplicate(pattern.to_string()));
        }
        let rp = table.matcher.try_register_pattern(pattern)?;

        debug!(
            method = %method,
            pattern = %pattern,
            normalized = %key,
            kind = ?kind,
            "Route registered"
        );

        let slot = RouteSlot {
            info: info(method, rp),
            endpoint,
            http_mws: Vec::new(),
            task_mws: Vec::new(),
            needs_tasks_ctx: false,
            chain: OnceCell::new(),
        };
        let slot = table.routes.entry(key).or_insert(slot);
        Ok(RouteBuilder { slot })
    }

    /// Register a conventional handler
    ///
    /// # Panics
    ///
    /// Panics when the pattern is malformed or already registered for `method`.
    pub fn register_handler<H>(&mut self, method: Method, pattern: &str, handler: H) -> RouteBuilder<'_>
    where
        H: Handler + 'static,
    {
        match self.try_register_handler(method, pattern, handler) {
            Ok(builder) => builder,
            Err(e) => panic!("{e}"),
        }
    }

    /// Register a conventional handler, reporting malformed or duplicate patterns
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the pattern is malformed or already registered.
    /// Patterns differing only in param names (`/users/:id` and `/users/:uid`) count as
    /// the same pattern.
    pub fn try_register_handler<H>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<RouteBuilder<'_>, PatternError>
    where
        H: Handler + 'static,
    {
        self.try_insert(
            method,
            pattern,
            HandlerKind::Http,
            Endpoint::Http(Arc::new(handler)),
            |m, rp| Arc::new(Route::<(), ()>::new(m, rp, HandlerKind::Http)),
        )
    }

    /// Register a task handler whose output is written as JSON
    ///
    /// # Panics
    ///
    /// Panics when the pattern is malformed or already registered for `method`.
    pub fn register_task_handler<I, O>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: TaskHandler<I, O>,
    ) -> RouteBuilder<'_>
    where
        I: DeserializeOwned + Send + Sync + 'static,
        O: Serialize + Send + Sync + 'static,
    {
        match self.try_register_task_handler(method, pattern, handler) {
            Ok(builder) => builder,
            Err(e) => panic!("{e}"),
        }
    }

    /// Register a task handler, reporting malformed or duplicate patterns
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the pattern is malformed or already registered.
    pub fn try_register_task_handler<I, O>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: TaskHandler<I, O>,
    ) -> Result<RouteBuilder<'_>, PatternError>
    where
        I: DeserializeOwned + Send + Sync + 'static,
        O: Serialize + Send + Sync + 'static,
    {
        self.try_insert(
            method,
            pattern,
            HandlerKind::Task,
            Endpoint::Task(Arc::new(handler)),
            |m, rp| Arc::new(Route::<I, O>::new(m, rp, HandlerKind::Task)),
        )
    }

    /// Wrap every route; global middleware is the outermost layer
    pub fn add_global_middleware(&mut self, mw: impl Middleware + 'static, opts: MiddlewareOptions) {
        self.global_http_mws.push(MiddlewareEntry {
            mw: Arc::new(mw),
            opts,
        });
        for table in self.methods.values_mut() {
            table.reset_chains();
        }
    }

    pub fn add_method_middleware(
        &mut self,
        method: Method,
        mw: impl Middleware + 'static,
        opts: MiddlewareOptions,
    ) {
        let table = self.table_mut(method);
        table.http_mws.push(MiddlewareEntry {
            mw: Arc::new(mw),
            opts,
        });
        table.reset_chains();
    }

    pub fn add_global_task_middleware(&mut self, mw: TaskMiddleware, opts: MiddlewareOptions) {
        self.global_task_mws.push(TaskMiddlewareEntry { mw, opts });
    }

    pub fn add_method_task_middleware(
        &mut self,
        method: Method,
        mw: TaskMiddleware,
        opts: MiddlewareOptions,
    ) {
        self.table_mut(method)
            .task_mws
            .push(TaskMiddlewareEntry { mw, opts });
    }

    pub fn set_not_found_handler(&mut self, handler: impl Handler + 'static) {
        self.not_found = Arc::new(handler);
    }

    /// Every registered route, ordered by method then pattern
    #[must_use]
    pub fn all_routes(&self) -> Vec<Arc<dyn AnyRoute>> {
        let mut routes: Vec<Arc<dyn AnyRoute>> = self
            .methods
            .values()
            .flat_map(|t| t.routes.values().map(|s| Arc::clone(&s.info)))
            .collect();
        routes.sort_by(|a, b| {
            (a.method().as_str(), a.original_pattern())
                .cmp(&(b.method().as_str(), b.original_pattern()))
        });
        routes
    }

    /// Path relative to the mount root, or `None` when the path lies outside it
    fn relative_path(&self, path: String) -> Option<String> {
        if self.mount_root.is_empty() {
            return Some(path);
        }
        if let Some(rest) = path.strip_prefix(self.mount_root.as_str()) {
            return Some(format!("/{rest}"));
        }
        (path == self.mount_root.trim_end_matches('/')).then(|| "/".to_string())
    }

    fn find(&self, method: &Method, path: &str) -> Option<(&MethodTable, &RouteSlot, BestMatch)> {
        let table = self.methods.get(method)?;
        let start = Instant::now();
        let best = table.matcher.find_best_match(path);
        let elapsed = start.elapsed();

        if elapsed > self.opts.runtime.slow_match_threshold {
            warn!(
                method = %method,
                path = %path,
                matched = best.is_some(),
                duration_us = elapsed.as_micros(),
                "Slow route matching detected"
            );
        }

        let best = best?;
        let slot = table.routes.get(best.pattern().normalized_pattern())?;
        Some((table, slot, best))
    }

    /// Dispatch one request
    ///
    /// Every outcome, including no match, ends in a written response.
    pub fn serve(&self, w: &mut dyn ResponseSink, req: Request) {
        let raw = req.uri().path();
        let decoded = match urlencoding::decode(raw) {
            Ok(Cow::Borrowed(p)) => p.to_string(),
            Ok(Cow::Owned(p)) => p,
            Err(_) => raw.to_string(),
        };

        let Some(path) = self.relative_path(decoded) else {
            debug!(method = %req.method(), path = %raw, mount_root = %self.mount_root, "Path outside mount root");
            self.not_found.serve(w, &req);
            return;
        };

        let method = req.method().clone();
        if let Some((table, slot, best)) = self.find(&method, &path) {
            self.dispatch(w, req, table, slot, best);
            return;
        }

        if method == Method::HEAD {
            if let Some((table, slot, best)) = self.find(&Method::GET, &path) {
                let mut head = HeadOnlySink::new(w);
                self.dispatch(&mut head, req, table, slot, best);
                head.finish();
                return;
            }
        }

        debug!(method = %method, path = %path, "No route matched");
        self.not_found.serve(w, &req);
    }

    fn chain_for(&self, table: &MethodTable, slot: &RouteSlot, handler: &Arc<dyn Handler>) -> Arc<dyn Handler> {
        let chain = slot.chain.get_or_init(|| {
            compose(
                Arc::clone(handler),
                &slot.http_mws,
                &table.http_mws,
                &self.global_http_mws,
            )
        });
        Arc::clone(chain)
    }

    fn has_task_middleware(&self, table: &MethodTable, slot: &RouteSlot) -> bool {
        !(self.global_task_mws.is_empty() && table.task_mws.is_empty() && slot.task_mws.is_empty())
    }

    fn dispatch(
        &self,
        w: &mut dyn ResponseSink,
        mut req: Request,
        table: &MethodTable,
        slot: &RouteSlot,
        best: BestMatch,
    ) {
        let (_, params, splat_values) = best.into_parts();
        let params: Arc<Params> = Arc::new(params);
        let splat_values: Arc<[String]> = splat_values.into();

        if let Endpoint::Http(handler) = &slot.endpoint {
            if !slot.needs_tasks_ctx && !self.has_task_middleware(table, slot) {
                let rc = RouteContext {
                    params,
                    splat_values,
                    tasks_ctx: None,
                };
                if !rc.is_empty() {
                    req.extensions_mut().insert(rc);
                }
                self.chain_for(table, slot, handler).serve(w, &req);
                return;
            }
        }

        let ctx = Ctx::with_ttl(self.opts.runtime.task_ttl);
        req.extensions_mut().insert(RouteContext {
            params: Arc::clone(&params),
            splat_values: Arc::clone(&splat_values),
            tasks_ctx: Some(ctx.clone()),
        });
        let req: SharedRequest = Arc::new(req);

        let final_handler = match &slot.endpoint {
            Endpoint::Http(handler) => self.chain_for(table, slot, handler),
            Endpoint::Task(endpoint) => {
                let scope = DispatchScope {
                    params: Arc::clone(&params),
                    splat_values: Arc::clone(&splat_values),
                    ctx: ctx.clone(),
                    request: Arc::clone(&req),
                };
                match endpoint.prepare(scope, self.opts.parse_input.as_ref()) {
                    Ok(h) => compose(h, &slot.http_mws, &table.http_mws, &self.global_http_mws),
                    Err(e) => {
                        self.fail(w, &req, &DispatchError::from(e));
                        return;
                    }
                }
            }
        };

        match self.run_task_middleware(&ctx, &req, table, slot, &params, &splat_values) {
            Ok(Some(merged)) => {
                if merged.apply(w) == Disposition::Halt {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.fail(w, &req, &DispatchError::Internal(e.to_string()));
                return;
            }
        }

        final_handler.serve(w, &req);
    }

    /// Run the applicable task middleware as one parallel batch and merge their proxies
    fn run_task_middleware(
        &self,
        ctx: &Ctx,
        req: &SharedRequest,
        table: &MethodTable,
        slot: &RouteSlot,
        params: &Arc<Params>,
        splat_values: &Arc<[String]>,
    ) -> Result<Option<ResponseProxy>, TaskError> {
        let entries: Vec<&TaskMiddlewareEntry> = self
            .global_task_mws
            .iter()
            .chain(&table.task_mws)
            .chain(&slot.task_mws)
            .filter(|e| e.opts.applies_to(req))
            .collect();
        if entries.is_empty() {
            return Ok(None);
        }

        let outputs: Vec<OutputSlot<ResponseProxy>> =
            entries.iter().map(|_| OutputSlot::new()).collect();
        let batch: Vec<Box<dyn BoundTask>> = entries
            .iter()
            .zip(&outputs)
            .map(|(entry, out)| {
                let mw = entry.mw.clone();
                let out = out.clone();
                let params = Arc::clone(params);
                let splat_values = Arc::clone(splat_values);
                let req = Arc::clone(req);
                Box::new(move |ctx: &Ctx| -> Result<(), TaskError> {
                    let mut data = REQ_DATA_POOL.checkout();
                    data.populate(
                        Arc::clone(&params),
                        Arc::clone(&splat_values),
                        Some(ctx.clone()),
                        Arc::clone(&req),
                    );
                    mw.call(ctx, &mut data).map_err(TaskError::from)?;
                    out.set(data.take_response_proxy());
                    Ok(())
                }) as Box<dyn BoundTask>
            })
            .collect();

        ctx.run_parallel(batch)?;

        let proxies: Vec<ResponseProxy> = outputs.iter().filter_map(OutputSlot::take).collect();
        Ok(Some(merge_proxies(&proxies)))
    }

    fn fail(&self, w: &mut dyn ResponseSink, req: &Request, err: &DispatchError) {
        match err {
            DispatchError::Validation(msg) => warn!(
                method = %req.method(),
                path = %req.uri().path(),
                error = %msg,
                "Request validation failed"
            ),
            DispatchError::Internal(detail) => error!(
                method = %req.method(),
                path = %req.uri().path(),
                error = %detail,
                "Request failed"
            ),
            DispatchError::NotFound => debug!(
                method = %req.method(),
                path = %req.uri().path(),
                "No route matched"
            ),
        }
        write_error(w, err.status(), err.client_message());
    }
}
