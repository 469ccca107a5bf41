use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::matcher::Params;
use crate::tasks::Ctx;

static EMPTY_PARAMS: Lazy<Params> = Lazy::new(Params::new);

/// Route data the router attaches to a request's extensions before dispatch
#[derive(Clone, Debug, Default)]
pub struct RouteContext {
    pub params: Arc<Params>,
    pub splat_values: Arc<[String]>,
    pub tasks_ctx: Option<Ctx>,
}

impl RouteContext {
    pub(crate) fn is_empty(&self) -> bool {
        self.params.is_empty() && self.splat_values.is_empty() && self.tasks_ctx.is_none()
    }
}

fn route_context<B>(req: &http::Request<B>) -> Option<&RouteContext> {
    req.extensions().get::<RouteContext>()
}

/// Params captured for the matched route; empty when the route has none
#[must_use]
pub fn get_params<B>(req: &http::Request<B>) -> &Params {
    route_context(req).map_or(&EMPTY_PARAMS, |rc| rc.params.as_ref())
}

#[must_use]
pub fn get_param<'r, B>(req: &'r http::Request<B>, name: &str) -> Option<&'r str> {
    get_params(req).get(name).map(String::as_str)
}

/// Path segments captured by a trailing splat
#[must_use]
pub fn get_splat_values<B>(req: &http::Request<B>) -> &[String] {
    route_context(req).map_or(&[], |rc| rc.splat_values.as_ref())
}

/// Task context of the current dispatch, present only on the general path
#[must_use]
pub fn get_tasks_ctx<B>(req: &http::Request<B>) -> Option<&Ctx> {
    route_context(req).and_then(|rc| rc.tasks_ctx.as_ref())
}
