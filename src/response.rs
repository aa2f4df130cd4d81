//! Raw HTTP responses as handed from the transport to the interpreters.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;

/// Status code and body bytes of a completed exchange.
///
/// Nothing has been classified yet: a `RawResponse` with status 200 may still
/// be a failure once the endpoint's success predicate is applied.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The full response body.
    pub body: Bytes,
    /// Time from sending the request to receiving the last body byte.
    pub latency: Duration,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            latency: Duration::ZERO,
        }
    }

    /// Returns `true` for the only success status this service uses.
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parses the body as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns the parse error text, or a description when the body is valid
    /// JSON but not an object.
    pub fn json_object(&self) -> std::result::Result<Map<String, Value>, String> {
        match serde_json::from_slice::<Value>(&self.body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err("expected a JSON object".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
