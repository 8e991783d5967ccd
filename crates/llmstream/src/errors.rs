use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "authentication_error")]
    Authentication,
    #[serde(rename = "invalid_request_error")]
    InvalidRequest,
    #[serde(rename = "rate_limit_error")]
    RateLimit,
    #[serde(rename = "server_error")]
    Server,
    #[serde(rename = "timeout_error")]
    Timeout,
    #[serde(rename = "connection_error")]
    Connection,
    #[serde(rename = "unknown_error")]
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication_error",
            ErrorKind::InvalidRequest => "invalid_request_error",
            ErrorKind::RateLimit => "rate_limit_error",
            ErrorKind::Server => "server_error",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::Connection => "connection_error",
            ErrorKind::Unknown => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by stream setup, `recv` and the stream processor.
///
/// End-of-stream is never a `StreamError`; it is reported as `Ok(None)`
/// by [`crate::ResponseStream::recv`].
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct StreamError {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
    pub param: Option<String>,
    pub code: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StreamError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            param: None,
            code: None,
            source: None,
        }
    }

    pub fn with_source<E>(kind: ErrorKind, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(kind, message)
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_param(mut self, param: Option<String>) -> Self {
        self.param = param;
        self
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    /// Failure while reading from the transport.
    pub fn transport(err: std::io::Error) -> Self {
        let kind = if is_deadline(&err) {
            ErrorKind::Timeout
        } else {
            ErrorKind::Connection
        };
        Self::with_source(kind, "failed to read event stream", err)
    }

    /// Event data that could not be decoded as the backend's JSON shape.
    pub fn malformed_payload(err: serde_json::Error) -> Self {
        Self::with_source(ErrorKind::Server, "failed to parse streaming response", err)
    }

    /// Non-success HTTP status whose body did not match the backend's error shape.
    pub fn unparsed_status(status_code: u16) -> Self {
        Self::new(
            ErrorKind::Server,
            format!("API error (status code: {})", status_code),
        )
        .with_status(status_code)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

/// Whether an I/O error means a read deadline fired.
fn is_deadline(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    ) || is_client_deadline(err)
}

/// The HTTP client reports its deadline as an `Other` I/O error wrapping
/// `ureq::Error::Timeout`.
#[cfg(feature = "client")]
fn is_client_deadline(err: &std::io::Error) -> bool {
    matches!(
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<ureq::Error>()),
        Some(ureq::Error::Timeout(_))
    )
}

#[cfg(not(feature = "client"))]
fn is_client_deadline(_err: &std::io::Error) -> bool {
    false
}
