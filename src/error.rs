//! Error taxonomy for request dispatch
//!
//! | Variant                     | Status | Client sees                 |
//! |-----------------------------|--------|-----------------------------|
//! | [`DispatchError::NotFound`]   | 404    | not-found handler output    |
//! | [`DispatchError::Validation`] | 400    | the validation message      |
//! | [`DispatchError::Internal`]   | 500    | `Internal Server Error`     |
//!
//! Internal details are logged, never sent to the client.

use std::fmt;

use http::StatusCode;

/// Failure to turn a request into a typed handler input
#[derive(Debug)]
pub enum InputError {
    /// The input was malformed or did not fit the expected shape
    Validation(String),
    /// Anything else, e.g. an I/O failure inside a custom parse function
    Other(anyhow::Error),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Validation(msg) => write!(f, "invalid input: {msg}"),
            InputError::Other(e) => write!(f, "failed to parse input: {e:#}"),
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InputError::Validation(_) => None,
            InputError::Other(e) => Some(e.as_ref()),
        }
    }
}

impl From<serde_json::Error> for InputError {
    fn from(e: serde_json::Error) -> Self {
        InputError::Validation(e.to_string())
    }
}

/// Outcome of a dispatch that could not produce a normal response
#[derive(Debug)]
pub enum DispatchError {
    NotFound,
    Validation(String),
    /// The detail is for logs only
    Internal(String),
}

impl DispatchError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NotFound => StatusCode::NOT_FOUND,
            DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client
    #[must_use]
    pub fn client_message(&self) -> &str {
        match self {
            DispatchError::NotFound => "404 page not found",
            DispatchError::Validation(msg) => msg,
            DispatchError::Internal(_) => "Internal Server Error",
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NotFound => write!(f, "no route matched"),
            DispatchError::Validation(msg) => write!(f, "validation error: {msg}"),
            DispatchError::Internal(detail) => write!(f, "internal error: {detail}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<InputError> for DispatchError {
    fn from(e: InputError) -> Self {
        match e {
            InputError::Validation(msg) => DispatchError::Validation(msg),
            InputError::Other(e) => DispatchError::Internal(format!("{e:#}")),
        }
    }
}
