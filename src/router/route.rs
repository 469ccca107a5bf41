use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use super::handler::{Handler, Request};
use super::input::{parse_input, ParseInputFn};
use super::req_data::ReqData;
use crate::error::InputError;
use crate::matcher::{Params, RegisteredPattern};
use crate::response::{internal_server_error, write_json, Disposition, ResponseSink};
use crate::tasks::{Ctx, TaskError};

/// What kind of endpoint a route dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// A conventional [`Handler`]
    Http,
    /// A [`TaskHandler`] whose output is serialized as JSON
    Task,
}

/// Uniform view over routes of any input and output type
pub trait AnyRoute: Send + Sync {
    fn original_pattern(&self) -> &str;
    fn method(&self) -> &Method;
    fn kind(&self) -> HandlerKind;
    fn pattern(&self) -> &Arc<RegisteredPattern>;
    /// Rust type name of the handler input; `()` for plain handlers
    fn input_type(&self) -> &'static str;
    fn output_type(&self) -> &'static str;
}

/// A registered route with its typed input and output
pub struct Route<I, O> {
    method: Method,
    pattern: Arc<RegisteredPattern>,
    kind: HandlerKind,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Route<I, O> {
    pub(crate) fn new(method: Method, pattern: Arc<RegisteredPattern>, kind: HandlerKind) -> Self {
        Self {
            method,
            pattern,
            kind,
            _types: PhantomData,
        }
    }
}

impl<I, O> AnyRoute for Route<I, O> {
    fn original_pattern(&self) -> &str {
        self.pattern.original_pattern()
    }

    fn method(&self) -> &Method {
        &self.method
    }

    fn kind(&self) -> HandlerKind {
        self.kind
    }

    fn pattern(&self) -> &Arc<RegisteredPattern> {
        &self.pattern
    }

    fn input_type(&self) -> &'static str {
        type_name::<I>()
    }

    fn output_type(&self) -> &'static str {
        type_name::<O>()
    }
}

impl fmt::Debug for dyn AnyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", self.method())
            .field("pattern", &self.original_pattern())
            .field("kind", &self.kind())
            .finish()
    }
}

type TaskHandlerFn<I, O> = dyn Fn(&Ctx, &mut ReqData<I>) -> anyhow::Result<O> + Send + Sync;

/// A handler that runs as a task and returns a value to serialize
///
/// The input is parsed from the request before the handler runs; the returned value is
/// written as JSON after the handler's response proxy is applied.
pub struct TaskHandler<I, O> {
    func: Arc<TaskHandlerFn<I, O>>,
}

impl<I, O> Clone for TaskHandler<I, O> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
        }
    }
}

impl<I, O> TaskHandler<I, O> {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Ctx, &mut ReqData<I>) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    pub(crate) fn call(&self, ctx: &Ctx, data: &mut ReqData<I>) -> anyhow::Result<O> {
        (self.func)(ctx, data)
    }
}

/// Task middleware: runs before the handler, in parallel with its siblings
///
/// Side effects go through the [`ReqData`] response proxy. An error status or a
/// redirect there stops the request before the handler; returning `Err` answers 500.
pub type TaskMiddleware = TaskHandler<(), ()>;

/// Route data handed to a task endpoint when it prepares a dispatch
pub(crate) struct DispatchScope {
    pub(crate) params: Arc<Params>,
    pub(crate) splat_values: Arc<[String]>,
    pub(crate) ctx: Ctx,
    pub(crate) request: Arc<Request>,
}

/// Type-erased task handler owned by a route slot
pub(crate) trait TaskEndpoint: Send + Sync {
    /// Parse the input and return a handler that runs the task once
    fn prepare(
        &self,
        scope: DispatchScope,
        parse: Option<&ParseInputFn>,
    ) -> Result<Arc<dyn Handler>, InputError>;
}

impl<I, O> TaskEndpoint for TaskHandler<I, O>
where
    I: DeserializeOwned + Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
{
    fn prepare(
        &self,
        scope: DispatchScope,
        parse: Option<&ParseInputFn>,
    ) -> Result<Arc<dyn Handler>, InputError> {
        let input: I = parse_input(&scope.request, parse)?;
        let data = ReqData::new(
            scope.params,
            scope.splat_values,
            Some(scope.ctx.clone()),
            scope.request,
            input,
        );
        Ok(Arc::new(TaskFinal {
            handler: self.clone(),
            ctx: scope.ctx,
            data: Mutex::new(Some(data)),
        }))
    }
}

/// Runs a prepared task handler and writes its output
struct TaskFinal<I, O> {
    handler: TaskHandler<I, O>,
    ctx: Ctx,
    data: Mutex<Option<ReqData<I>>>,
}

impl<I, O> Handler for TaskFinal<I, O>
where
    I: Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
{
    fn serve(&self, w: &mut dyn ResponseSink, req: &Request) {
        let taken = self
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut data) = taken else {
            error!(path = %req.uri().path(), "Task handler invoked more than once");
            internal_server_error(w);
            return;
        };

        let result = catch_unwind(AssertUnwindSafe(|| self.handler.call(&self.ctx, &mut data)))
            .unwrap_or_else(|panic| Err(TaskError::from_panic(panic).into()));
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                error!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    error = %format!("{e:#}"),
                    "Task handler failed"
                );
                internal_server_error(w);
                return;
            }
        };

        if data.response_proxy().apply(w) == Disposition::Halt {
            return;
        }

        let value = match serde_json::to_value(&output) {
            Ok(value) => value,
            Err(e) => {
                error!(path = %req.uri().path(), error = %e, "Failed to serialize task output");
                internal_server_error(w);
                return;
            }
        };
        if value == Value::Null {
            warn!(
                method = %req.method(),
                path = %req.uri().path(),
                output = type_name::<O>(),
                "Task handler returned null"
            );
        }
        if let Err(e) = write_json(w, &value) {
            error!(path = %req.uri().path(), error = %e, "Failed to write task output");
        }
    }
}
