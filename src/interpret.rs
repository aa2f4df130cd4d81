//! Turning raw responses into payloads or normalized failures.
//!
//! All failure text goes through [`extract_error_message`]. Endpoints that
//! reuse status codes for business meaning (for example 201 for bad
//! credentials) declare an override function that is consulted first.

use http::StatusCode;
use serde_json::{Map, Value};

use crate::{response::RawResponse, Error, Result};

/// Bodies at or above this many bytes are not quoted in error messages.
pub const MAX_QUOTED_BODY: usize = 256;

/// Builds a human-readable failure message from a response body.
///
/// 1. An empty body yields `prefix` unchanged.
/// 2. A JSON object yields its non-empty `message` string verbatim, else
///    `"<prefix>: <status>"` for a non-empty `status` string, else
///    `"<prefix>: <raw JSON>"`.
/// 3. Anything else is quoted trimmed when shorter than
///    [`MAX_QUOTED_BODY`] bytes, and elided otherwise.
///
/// # Examples
///
/// ```
/// use filexchange::interpret::extract_error_message;
///
/// assert_eq!(extract_error_message(b"", "Upload failed"), "Upload failed");
/// assert_eq!(
///     extract_error_message(br#"{"message":"Quota exceeded"}"#, "Upload failed"),
///     "Quota exceeded"
/// );
/// assert_eq!(
///     extract_error_message(br#"{"status":"denied"}"#, "Upload failed"),
///     "Upload failed: denied"
/// );
/// assert_eq!(
///     extract_error_message(b"  busy \n", "Upload failed"),
///     "Upload failed: busy"
/// );
/// ```
pub fn extract_error_message(body: &[u8], prefix: &str) -> String {
    if body.is_empty() {
        return prefix.to_string();
    }

    if let Ok(Value::Object(obj)) = serde_json::from_slice::<Value>(body) {
        if let Some(message) = non_empty_str(&obj, "message") {
            return message.to_string();
        }
        if let Some(status) = non_empty_str(&obj, "status") {
            return format!("{}: {}", prefix, status);
        }
        return format!("{}: {}", prefix, String::from_utf8_lossy(body));
    }

    if body.len() < MAX_QUOTED_BODY {
        format!("{}: {}", prefix, String::from_utf8_lossy(body).trim())
    } else {
        format!("{} (response too long to display)", prefix)
    }
}

/// A string field that is present and non-empty.
pub(crate) fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Endpoint-specific status handling applied before the generic policy.
///
/// Returns `Some(message)` when the status code carries a fixed meaning.
type Overrides = Box<dyn Fn(StatusCode, &[u8]) -> Option<String> + Send + Sync>;

/// How one endpoint's failures are described.
pub(crate) struct FailurePolicy {
    prefix: String,
    overrides: Option<Overrides>,
}

impl FailurePolicy {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: None,
        }
    }

    pub(crate) fn with_overrides<F>(mut self, overrides: F) -> Self
    where
        F: Fn(StatusCode, &[u8]) -> Option<String> + Send + Sync + 'static,
    {
        self.overrides = Some(Box::new(overrides));
        self
    }

    /// Describes a response whose status is not the success code.
    pub(crate) fn status_failure(&self, raw: &RawResponse) -> Error {
        let message = self
            .overrides
            .as_ref()
            .and_then(|o| o(raw.status, &raw.body))
            .unwrap_or_else(|| extract_error_message(&raw.body, &self.prefix));
        log_failure(raw, &message);
        Error::application(message, raw.status)
    }

    /// Requires the success status, then hands the response on.
    pub(crate) fn expect_ok<'a>(&self, raw: &'a RawResponse) -> Result<&'a RawResponse> {
        if raw.is_ok() {
            Ok(raw)
        } else {
            Err(self.status_failure(raw))
        }
    }

    /// Requires the success status and a JSON object body.
    pub(crate) fn expect_object(&self, raw: &RawResponse) -> Result<Map<String, Value>> {
        self.expect_ok(raw)?;
        raw.json_object().map_err(|e| {
            tracing::error!(
                error = %e,
                status = raw.status.as_u16(),
                "Failed to parse response body"
            );
            Error::protocol(
                format!("Could not parse server response as JSON ({})", e),
                raw.status,
            )
        })
    }
}

/// Describes a 200 response whose body fails the success predicate.
pub(crate) fn predicate_failure(raw: &RawResponse, prefix: &str) -> Error {
    let message = extract_error_message(&raw.body, prefix);
    log_failure(raw, &message);
    Error::application(message, raw.status)
}

fn log_failure(raw: &RawResponse, message: &str) {
    if raw.status.is_server_error() {
        tracing::warn!(status = raw.status.as_u16(), message = %message, "Server error (5xx)");
    } else {
        tracing::error!(status = raw.status.as_u16(), message = %message, "Request rejected");
    }
}

/// Returns `true` if the object has `"status": "success"`.
pub(crate) fn has_success_marker(obj: &Map<String, Value>) -> bool {
    obj.get("status").and_then(Value::as_str) == Some("success")
}
