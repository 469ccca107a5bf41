use std::collections::HashMap;

use cookie::Cookie;
use http::header::{LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::sink::ResponseSink;
use super::write::write_error;

/// Header carrying a redirect target for cooperative fetch-based clients
pub const CLIENT_REDIRECT_HEADER: &str = "x-client-redirect";

/// Request header a client sends to opt into [`CLIENT_REDIRECT_HEADER`] redirects
pub const CLIENT_ACCEPTS_REDIRECT_HEADER: &str = "x-accepts-client-redirect";

/// What the caller should do after applying a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Success: keep producing the body
    Continue,
    /// Error or redirect: the response is terminated
    Halt,
}

/// A supplementary markup element destined for the document head
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_html: Option<String>,
}

impl HeadElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            inner_html: None,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_inner_html(mut self, html: impl Into<String>) -> Self {
        self.inner_html = Some(html.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderOpKind {
    Set,
    Add,
}

#[derive(Debug, Clone)]
struct HeaderOp {
    kind: HeaderOpKind,
    value: String,
}

/// Deferred, mergeable accumulator of response side effects
///
/// A proxy never performs I/O. It records status, header operations, cookies, a redirect
/// target and head elements so that work running concurrently can each describe its
/// effect on the response; the owner later merges them and applies the result once.
///
/// Header keys are case-insensitive and kept in first-use order. `set_header` replaces
/// every earlier value for the key (including values already on the live response when
/// applied), `add_header` appends.
#[derive(Debug, Clone, Default)]
pub struct ResponseProxy {
    status: Option<StatusCode>,
    status_text: Option<String>,
    header_ops: Vec<(String, Vec<HeaderOp>)>,
    cookies: Vec<Cookie<'static>>,
    head_elements: Vec<HeadElement>,
    location: Option<String>,
}

impl ResponseProxy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every recorded effect so the proxy can be reused
    pub fn reset(&mut self) {
        self.status = None;
        self.status_text = None;
        self.header_ops.clear();
        self.cookies.clear();
        self.head_elements.clear();
        self.location = None;
    }

    // ---- status ----

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Set a status with custom text, used as the body of error responses
    pub fn set_status_with_text(&mut self, status: StatusCode, text: impl Into<String>) {
        self.status = Some(status);
        self.status_text = Some(text.into());
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    #[must_use]
    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    // ---- headers ----

    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        self.push_op(key, HeaderOpKind::Set, value.into());
    }

    pub fn add_header(&mut self, key: &str, value: impl Into<String>) {
        self.push_op(key, HeaderOpKind::Add, value.into());
    }

    /// First effective value for `key`
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers(key).into_iter().next()
    }

    /// Effective values for `key` after replaying set/add operations in order
    #[must_use]
    pub fn headers(&self, key: &str) -> Vec<&str> {
        self.ops_for(key).map(compute_values).unwrap_or_default()
    }

    fn ops_for(&self, key: &str) -> Option<&[HeaderOp]> {
        self.header_ops
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, ops)| ops.as_slice())
    }

    fn push_op(&mut self, key: &str, kind: HeaderOpKind, value: String) {
        self.extend_ops(key, std::iter::once(HeaderOp { kind, value }));
    }

    fn extend_ops(&mut self, key: &str, ops: impl IntoIterator<Item = HeaderOp>) {
        if let Some((_, existing)) = self
            .header_ops
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            existing.extend(ops);
        } else {
            self.header_ops
                .push((key.to_ascii_lowercase(), ops.into_iter().collect()));
        }
    }

    // ---- cookies ----

    pub fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.cookies.push(cookie);
    }

    #[must_use]
    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    // ---- head elements ----

    pub fn add_head_element(&mut self, element: HeadElement) {
        self.head_elements.push(element);
    }

    pub fn add_head_elements(&mut self, elements: impl IntoIterator<Item = HeadElement>) {
        self.head_elements.extend(elements);
    }

    #[must_use]
    pub fn head_elements(&self) -> &[HeadElement] {
        &self.head_elements
    }

    // ---- redirects ----

    /// Redirect, upgrading to a client redirect when the request opted in
    ///
    /// Returns `true` when the redirect was recorded as a client redirect.
    pub fn redirect(&mut self, request_headers: &HeaderMap, url: &str, code: Option<StatusCode>) -> bool {
        if accepts_client_redirect(request_headers) {
            return self.client_redirect(url);
        }
        self.server_redirect(url, code);
        false
    }

    /// Record a server redirect (default `302 Found`); ignored when an error is set
    pub fn server_redirect(&mut self, url: &str, code: Option<StatusCode>) {
        if self.is_error() {
            debug!(location = %url, "Ignoring redirect on error response");
            return;
        }
        self.status = Some(code.unwrap_or(StatusCode::FOUND));
        self.location = Some(url.to_string());
    }

    /// Record a client redirect via [`CLIENT_REDIRECT_HEADER`]
    ///
    /// Sets `200 OK` when no status was set. Returns `false` and records nothing when
    /// `url` is neither a root-relative path nor an absolute http(s) URL.
    pub fn client_redirect(&mut self, url: &str) -> bool {
        if !is_valid_redirect_url(url) {
            warn!(location = %url, "Rejecting client redirect to invalid URL");
            return false;
        }
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.set_header(CLIENT_REDIRECT_HEADER, url);
        true
    }

    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    // ---- classification ----

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_some_and(|s| s.as_u16() >= 400)
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        self.is_server_redirect() || self.is_client_redirect()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| s.is_success())
    }

    fn is_server_redirect(&self) -> bool {
        self.status.is_some_and(|s| s.is_redirection()) && self.location.is_some()
    }

    fn is_client_redirect(&self) -> bool {
        self.header(CLIENT_REDIRECT_HEADER)
            .is_some_and(|v| !v.is_empty())
    }

    /// Commit the recorded effects to a live response
    ///
    /// Headers and cookies are written first. A server redirect then writes `Location`
    /// and its status; an error status writes a `text/plain` body with the status text
    /// (or the canonical reason); any other status is committed as is.
    pub fn apply(&self, w: &mut dyn ResponseSink) -> Disposition {
        for (key, ops) in &self.header_ops {
            let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
                warn!(header = %key, "Skipping invalid header name");
                continue;
            };
            if ops.iter().any(|op| op.kind == HeaderOpKind::Set) {
                w.headers_mut().remove(&name);
            }
            for value in compute_values(ops) {
                match HeaderValue::from_str(value) {
                    Ok(v) => {
                        w.headers_mut().append(name.clone(), v);
                    }
                    Err(_) => warn!(header = %key, "Skipping invalid header value"),
                }
            }
        }

        for cookie in &self.cookies {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(v) => {
                    w.headers_mut().append(SET_COOKIE, v);
                }
                Err(_) => warn!(cookie = %cookie.name(), "Skipping unencodable cookie"),
            }
        }

        if self.is_server_redirect() && !self.is_error() {
            if let (Some(status), Some(location)) = (self.status, &self.location) {
                match HeaderValue::from_str(location) {
                    Ok(v) => {
                        w.headers_mut().insert(LOCATION, v);
                    }
                    Err(_) => warn!(location = %location, "Skipping invalid redirect location"),
                }
                w.write_status(status);
            }
            return Disposition::Halt;
        }

        if let Some(status) = self.status {
            if self.is_error() {
                let text = self
                    .status_text
                    .as_deref()
                    .or_else(|| status.canonical_reason())
                    .unwrap_or("");
                write_error(w, status, text);
                return Disposition::Halt;
            }
            w.write_status(status);
        }

        if self.is_redirect() {
            Disposition::Halt
        } else {
            Disposition::Continue
        }
    }
}

fn compute_values(ops: &[HeaderOp]) -> Vec<&str> {
    let mut values = Vec::new();
    for op in ops {
        if op.kind == HeaderOpKind::Set {
            values.clear();
        }
        values.push(op.value.as_str());
    }
    values
}

fn accepts_client_redirect(request_headers: &HeaderMap) -> bool {
    request_headers
        .get(CLIENT_ACCEPTS_REDIRECT_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn is_valid_redirect_url(url: &str) -> bool {
    if url.starts_with('/') {
        // protocol-relative URLs are not root-relative
        return !url.starts_with("//");
    }
    url::Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Merge proxies ordered root-first into one
///
/// - head elements and header operations are concatenated in order
/// - cookies are de-duplicated by name (the last one wins), ordered by the proxy that
///   contributed the winner
/// - the first error status wins; otherwise the last status wins until a redirect status
///   has been taken
/// - without an error, the first redirect wins, including a client redirect header
#[must_use]
pub fn merge_proxies(proxies: &[ResponseProxy]) -> ResponseProxy {
    let mut merged = ResponseProxy::new();

    for p in proxies {
        merged.head_elements.extend(p.head_elements.iter().cloned());
        for (key, ops) in &p.header_ops {
            merged.extend_ops(key, ops.iter().cloned());
        }
    }

    // name -> (proxy index, sequence, cookie)
    let mut latest: HashMap<&str, (usize, usize, &Cookie<'static>)> = HashMap::new();
    let mut seq = 0;
    for (i, p) in proxies.iter().enumerate() {
        for c in &p.cookies {
            latest.insert(c.name(), (i, seq, c));
            seq += 1;
        }
    }
    let mut deduped: Vec<_> = latest.into_values().collect();
    deduped.sort_by_key(|(i, s, _)| (*i, *s));
    merged.cookies = deduped.into_iter().map(|(_, _, c)| c.clone()).collect();

    for p in proxies {
        if p.is_error() {
            merged.status = p.status;
            merged.status_text = p.status_text.clone();
            break;
        } else if merged.status.map_or(true, |s| s.as_u16() < 300) {
            merged.status = p.status;
            merged.status_text = p.status_text.clone();
        }
    }

    if !merged.is_error() {
        if let Some(p) = proxies.iter().find(|p| p.is_redirect()) {
            merged.status = p.status;
            merged.location = p.location.clone();
            if p.is_client_redirect() {
                if let Some(target) = p.header(CLIENT_REDIRECT_HEADER) {
                    let target = target.to_string();
                    merged.set_header(CLIENT_REDIRECT_HEADER, target);
                }
            }
        }
    }

    merged
}
