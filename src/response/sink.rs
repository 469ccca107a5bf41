use http::{HeaderMap, Response, StatusCode};

/// The live response a dispatch writes into
///
/// Mirrors the usual transport contract: headers are staged through
/// [`headers_mut`](ResponseSink::headers_mut), the first status written wins, and writing
/// body bytes before any status implies `200 OK`.
pub trait ResponseSink {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status line; later calls are ignored
    fn write_status(&mut self, status: StatusCode);

    fn write_body(&mut self, chunk: &[u8]);

    /// Status committed so far, if any
    fn status(&self) -> Option<StatusCode>;
}

/// In-memory sink that keeps everything written to it
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl BufferedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed status, defaulting to `200 OK` like a transport would
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid UTF-8
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a header that are valid UTF-8
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, lossy for non UTF-8 bytes
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert into an `http::Response`
    #[must_use]
    pub fn into_response(self) -> Response<Vec<u8>> {
        let mut res = Response::new(self.body);
        *res.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *res.headers_mut() = self.headers;
        res
    }
}

impl ResponseSink for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, chunk: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(chunk);
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

/// Sink adapter that serves a HEAD request from a GET handler
///
/// Headers and status are captured and forwarded by [`finish`](HeadOnlySink::finish);
/// body bytes are discarded.
pub struct HeadOnlySink<'a> {
    inner: &'a mut dyn ResponseSink,
    headers: HeaderMap,
    status: Option<StatusCode>,
}

impl<'a> HeadOnlySink<'a> {
    pub fn new(inner: &'a mut dyn ResponseSink) -> Self {
        Self {
            inner,
            headers: HeaderMap::new(),
            status: None,
        }
    }

    /// Forward captured headers, then the captured status (default `200 OK`)
    pub fn finish(self) {
        let Self {
            inner,
            headers,
            status,
        } = self;
        let target = inner.headers_mut();
        let mut last_name = None;
        for (name, value) in headers {
            // `HeaderMap::into_iter` yields `None` names for repeated values
            if let Some(n) = name {
                target.remove(&n);
                last_name = Some(n);
            }
            if let Some(n) = &last_name {
                target.append(n.clone(), value);
            }
        }
        inner.write_status(status.unwrap_or(StatusCode::OK));
    }
}

impl ResponseSink for HeadOnlySink<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, _chunk: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }
}
