use std::any::TypeId;
use std::sync::Arc;

use http::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::handler::Request;
use crate::error::InputError;

/// Turns a request into the structured value a task handler's input is read from
pub type ParseInputFn = Arc<dyn Fn(&Request) -> Result<Value, InputError> + Send + Sync>;

/// Read a JSON body, or the query string as an object of strings
///
/// Bodies are read for methods other than GET and HEAD when they are non-empty. A
/// query key that appears more than once becomes an array of its values.
///
/// # Errors
///
/// Returns [`InputError::Validation`] for a body that is not valid JSON.
pub fn default_parse_input(req: &Request) -> Result<Value, InputError> {
    let reads_body = req.method() != Method::GET && req.method() != Method::HEAD;
    if reads_body && !req.body().is_empty() {
        return Ok(serde_json::from_slice(req.body())?);
    }

    let mut map = Map::new();
    if let Some(query) = req.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = Value::String(value.into_owned());
            match map.get_mut(key.as_ref()) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(key.into_owned(), value);
                }
            }
        }
    }
    Ok(Value::Object(map))
}

/// Produce the typed input for a task handler
///
/// Handlers taking `()` never look at the request.
pub(crate) fn parse_input<I>(req: &Request, parse: Option<&ParseInputFn>) -> Result<I, InputError>
where
    I: DeserializeOwned + 'static,
{
    if TypeId::of::<I>() == TypeId::of::<()>() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    let value = match parse {
        Some(f) => f(req)?,
        None => default_parse_input(req)?,
    };
    Ok(serde_json::from_value(value)?)
}
