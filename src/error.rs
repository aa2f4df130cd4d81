//! Error types for FileseXchange API calls.
//!
//! Every operation resolves to exactly one [`Outcome`]. Failures carry a
//! human-readable message and a status code; the status code is `0` whenever
//! no HTTP response was obtained (local validation, network failure, timeout).

use http::StatusCode;

/// The error half of every [`Outcome`].
///
/// # Examples
///
/// ```no_run
/// use filexchange::{Client, Error, Session};
///
/// # async fn example(session: Session) -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://files.example.com/api/")?
///     .build()?;
///
/// match client.list_user_files(&session).await {
///     Ok(files) => println!("{} files", files.len()),
///     Err(Error::Application { message, status }) => {
///         eprintln!("server refused ({status}): {message}");
///     }
///     Err(e) => eprintln!("{} (code {})", e.message(), e.status_code()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required input was missing or unusable. Detected before any request
    /// is sent, so the transport is never touched.
    #[error("{message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// The transport could not complete the exchange (DNS, refused
    /// connection, interrupted transfer).
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// A response arrived but its body could not be read as the endpoint
    /// requires (for example malformed JSON).
    #[error("{message}")]
    Protocol {
        /// Description of the parse failure
        message: String,
        /// The HTTP status code of the response
        status: StatusCode,
    },

    /// A well-formed response that fails the endpoint's success predicate.
    ///
    /// The message is produced by the shared extraction policy in
    /// [`crate::interpret::extract_error_message`], after endpoint-specific
    /// status overrides.
    #[error("{message}")]
    Application {
        /// Human-readable failure text
        message: String,
        /// The HTTP status code of the response
        status: StatusCode,
    },

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            // Download URLs carry the token in their query.
            Error::Network(e.without_url())
        }
    }
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn application(message: impl Into<String>, status: StatusCode) -> Self {
        Error::Application {
            message: message.into(),
            status,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>, status: StatusCode) -> Self {
        Error::Protocol {
            message: message.into(),
            status,
        }
    }

    /// Returns the status code reported alongside the message.
    ///
    /// `0` means no HTTP response was obtained.
    ///
    /// # Examples
    ///
    /// ```
    /// use filexchange::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::Application {
    ///     message: "File for deletion not found on server".to_string(),
    ///     status: StatusCode::NOT_FOUND,
    /// };
    /// assert_eq!(err.status_code(), 404);
    ///
    /// let err = Error::Validation { message: "Missing token".to_string() };
    /// assert_eq!(err.status_code(), 0);
    /// ```
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Protocol { status, .. } | Error::Application { status, .. } => status.as_u16(),
            Error::Validation { .. }
            | Error::Network(_)
            | Error::Timeout
            | Error::ConfigurationError(_)
            | Error::InvalidUrl(_) => 0,
        }
    }

    /// Returns the human-readable failure text.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns `true` if this failure happened before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. } | Error::ConfigurationError(_) | Error::InvalidUrl(_)
        )
    }

    /// Returns `true` if this error is potentially transient.
    ///
    /// Network errors, timeouts and 5xx responses are considered retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use filexchange::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::Application {
    ///     message: "Internal server error".to_string(),
    ///     status: StatusCode::BAD_GATEWAY,
    /// };
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::Application {
    ///     message: "Authorization error accessing files".to_string(),
    ///     status: StatusCode::FORBIDDEN,
    /// };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Timeout => true,
            Error::Application { status, .. } => status.is_server_error(),
            Error::Protocol { .. } => false,
            Error::Validation { .. } => false,
            Error::ConfigurationError(_) => false,
            Error::InvalidUrl(_) => false,
        }
    }
}

/// A specialized `Result` type for crate internals and client construction.
pub type Result<T> = std::result::Result<T, Error>;

/// The uniform result of every API operation: `Ok(payload)` or a failure
/// carrying a message and status code.
pub type Outcome<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_failures_report_status_zero() {
        let err = Error::validation("Missing authorization token");
        assert_eq!(err.status_code(), 0);
        assert!(err.is_local());
        assert_eq!(err.message(), "Missing authorization token");

        assert_eq!(Error::Timeout.status_code(), 0);
        assert!(!Error::Timeout.is_local());
    }

    #[test]
    fn response_failures_report_http_status() {
        let err = Error::protocol("Could not parse server response", StatusCode::OK);
        assert_eq!(err.status_code(), 200);
        assert!(!err.is_retryable());

        let err = Error::application("Invalid credentials", StatusCode::CREATED);
        assert_eq!(err.status_code(), 201);
        assert_eq!(err.to_string(), "Invalid credentials");
    }
}
