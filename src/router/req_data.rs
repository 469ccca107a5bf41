use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use cookie::Cookie;
use http::StatusCode;
use once_cell::sync::Lazy;

use super::handler::{Request, SharedRequest};
use crate::matcher::Params;
use crate::response::{HeadElement, ResponseProxy};
use crate::tasks::Ctx;

static EMPTY_REQUEST: Lazy<SharedRequest> = Lazy::new(|| Arc::new(Request::default()));

/// Everything a task handler or task middleware sees about its request
///
/// The response side effects recorded here are collected in a [`ResponseProxy`] and
/// applied by the router once the task returns.
#[derive(Debug)]
pub struct ReqData<I> {
    params: Arc<Params>,
    splat_values: Arc<[String]>,
    tasks_ctx: Option<Ctx>,
    request: SharedRequest,
    proxy: ResponseProxy,
    input: I,
}

impl<I: Default> Default for ReqData<I> {
    fn default() -> Self {
        Self {
            params: Arc::default(),
            splat_values: Arc::from(Vec::new()),
            tasks_ctx: None,
            request: Arc::clone(&EMPTY_REQUEST),
            proxy: ResponseProxy::new(),
            input: I::default(),
        }
    }
}

impl<I> ReqData<I> {
    pub(crate) fn new(
        params: Arc<Params>,
        splat_values: Arc<[String]>,
        tasks_ctx: Option<Ctx>,
        request: SharedRequest,
        input: I,
    ) -> Self {
        Self {
            params,
            splat_values,
            tasks_ctx,
            request,
            proxy: ResponseProxy::new(),
            input,
        }
    }

    pub(crate) fn populate(
        &mut self,
        params: Arc<Params>,
        splat_values: Arc<[String]>,
        tasks_ctx: Option<Ctx>,
        request: SharedRequest,
    ) {
        self.params = params;
        self.splat_values = splat_values;
        self.tasks_ctx = tasks_ctx;
        self.request = request;
        self.proxy.reset();
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn splat_values(&self) -> &[String] {
        &self.splat_values
    }

    #[must_use]
    pub fn tasks_ctx(&self) -> Option<&Ctx> {
        self.tasks_ctx.as_ref()
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn shared_request(&self) -> &SharedRequest {
        &self.request
    }

    #[must_use]
    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    #[must_use]
    pub fn response_proxy(&self) -> &ResponseProxy {
        &self.proxy
    }

    pub fn response_proxy_mut(&mut self) -> &mut ResponseProxy {
        &mut self.proxy
    }

    pub(crate) fn take_response_proxy(&mut self) -> ResponseProxy {
        std::mem::take(&mut self.proxy)
    }

    /// Redirect the client
    ///
    /// Clients that send `X-Accepts-Client-Redirect: true` get an `X-Client-Redirect`
    /// header and a 200 so they can navigate themselves; everyone else gets a server
    /// redirect (302 unless `code` says otherwise). Returns `true` for a client redirect.
    pub fn redirect(&mut self, url: &str, code: Option<StatusCode>) -> bool {
        self.proxy.redirect(self.request.headers(), url, code)
    }

    pub fn set_response_status(&mut self, status: StatusCode) {
        self.proxy.set_status(status);
    }

    pub fn set_response_status_with_text(&mut self, status: StatusCode, text: impl Into<String>) {
        self.proxy.set_status_with_text(status, text);
    }

    pub fn set_response_header(&mut self, key: &str, value: impl Into<String>) {
        self.proxy.set_header(key, value);
    }

    pub fn add_response_header(&mut self, key: &str, value: impl Into<String>) {
        self.proxy.add_header(key, value);
    }

    pub fn set_response_cookie(&mut self, cookie: Cookie<'static>) {
        self.proxy.set_cookie(cookie);
    }

    pub fn add_head_element(&mut self, element: HeadElement) {
        self.proxy.add_head_element(element);
    }

    #[must_use]
    pub fn response_status(&self) -> Option<StatusCode> {
        self.proxy.status()
    }

    #[must_use]
    pub fn response_header(&self, key: &str) -> Option<&str> {
        self.proxy.header(key)
    }

    #[must_use]
    pub fn response_cookies(&self) -> &[Cookie<'static>] {
        self.proxy.cookies()
    }

    #[must_use]
    pub fn is_response_error(&self) -> bool {
        self.proxy.is_error()
    }

    #[must_use]
    pub fn is_response_redirect(&self) -> bool {
        self.proxy.is_redirect()
    }

    #[must_use]
    pub fn is_response_success(&self) -> bool {
        self.proxy.is_success()
    }
}

impl<I: Default> ReqData<I> {
    /// Clear every per-request field before the value goes back to a pool
    pub(crate) fn reset(&mut self) {
        self.params = Arc::default();
        self.splat_values = Arc::from(Vec::new());
        self.tasks_ctx = None;
        self.request = Arc::clone(&EMPTY_REQUEST);
        self.proxy.reset();
        self.input = I::default();
    }
}

const POOL_CAPACITY: usize = 256;

/// Free list of request data for input-less tasks (middleware and nested layers)
pub(crate) static REQ_DATA_POOL: Lazy<Pool> = Lazy::new(Pool::default);

#[derive(Default)]
pub(crate) struct Pool {
    free: Mutex<Vec<ReqData<()>>>,
}

impl Pool {
    pub(crate) fn checkout(&'static self) -> Pooled {
        let item = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        Pooled { item, pool: self }
    }

    fn checkin(&self, mut item: ReqData<()>) {
        item.reset();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < POOL_CAPACITY {
            free.push(item);
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Checked-out request data; goes back to the pool, cleared, when dropped
pub(crate) struct Pooled {
    item: ReqData<()>,
    pool: &'static Pool,
}

impl Deref for Pooled {
    type Target = ReqData<()>;

    fn deref(&self) -> &Self::Target {
        &self.item
    }
}

impl DerefMut for Pooled {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.item
    }
}

impl Drop for Pooled {
    fn drop(&mut self) {
        self.pool.checkin(std::mem::take(&mut self.item));
    }
}
