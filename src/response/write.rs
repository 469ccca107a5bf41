use http::header::{CONTENT_TYPE, LOCATION, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use tracing::warn;

use super::sink::ResponseSink;

/// Write a plain-text error response
///
/// The body is `message` followed by a newline.
pub fn write_error(w: &mut dyn ResponseSink, status: StatusCode, message: &str) {
    let headers = w.headers_mut();
    headers.remove(http::header::CONTENT_LENGTH);
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    w.write_status(status);
    w.write_body(message.as_bytes());
    w.write_body(b"\n");
}

/// Serialize `value` as the JSON body
///
/// # Errors
///
/// Returns the serialization error; nothing is written in that case.
pub fn write_json<T: Serialize + ?Sized>(
    w: &mut dyn ResponseSink,
    value: &T,
) -> Result<(), serde_json::Error> {
    let body = serde_json::to_vec(value)?;
    w.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    w.write_body(&body);
    Ok(())
}

pub fn write_redirect(w: &mut dyn ResponseSink, location: &str, status: StatusCode) {
    match HeaderValue::from_str(location) {
        Ok(v) => {
            w.headers_mut().insert(LOCATION, v);
        }
        Err(_) => warn!(location = %location, "Skipping invalid redirect location"),
    }
    w.write_status(status);
}

pub fn not_found(w: &mut dyn ResponseSink) {
    write_error(w, StatusCode::NOT_FOUND, "404 page not found");
}

pub fn internal_server_error(w: &mut dyn ResponseSink) {
    write_error(
        w,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error",
    );
}
