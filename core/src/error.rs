//! Error types for request execution.
//!
//! # Design
//! Every failure a caller can observe is a `RequestError`. The `kind` tells
//! pre-dispatch mistakes (`Configuration`, `Serialization`) apart from
//! failures that settle an outcome after dispatch. The error is `Clone` so
//! that each observer of a shared outcome gets its own copy; lower-level
//! causes are kept behind `Arc` for the same reason.
//!
//! The request snapshot and any partial response are attached for
//! diagnostics only. Classification never looks at them.

use std::sync::Arc;

use thiserror::Error;

use crate::request::RequestSnapshot;
use crate::response::Response;

/// Which stage of a request produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Method or target missing or malformed. Raised before any I/O.
    Configuration,
    /// The body could not be encoded as JSON. Raised before any I/O.
    Serialization,
    /// Connection or socket level failure, including a corrupt gzip stream.
    Transport,
    /// The timeout elapsed before the request settled.
    Timeout,
    /// A response arrived with a status outside `[200, 300)`.
    HttpStatus,
    /// The response could not be assembled.
    ResponseProcessing,
}

/// Lower-level error wrapped by a `RequestError`.
#[derive(Debug, Clone, Error)]
pub enum Cause {
    #[error(transparent)]
    Io(Arc<std::io::Error>),

    #[error(transparent)]
    Json(Arc<serde_json::Error>),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Hyper(Arc<hyper::Error>),

    #[error(transparent)]
    Http(Arc<http::Error>),

    #[error("invalid header name {0:?}")]
    HeaderName(String),

    #[error("invalid value for header {0:?}")]
    HeaderValue(String),
}

impl From<std::io::Error> for Cause {
    fn from(err: std::io::Error) -> Self {
        Cause::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Cause {
    fn from(err: serde_json::Error) -> Self {
        Cause::Json(Arc::new(err))
    }
}

impl From<hyper::Error> for Cause {
    fn from(err: hyper::Error) -> Self {
        Cause::Hyper(Arc::new(err))
    }
}

impl From<http::Error> for Cause {
    fn from(err: http::Error) -> Self {
        Cause::Http(Arc::new(err))
    }
}

/// An error produced while configuring or executing a request.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RequestError {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Cause>,
    request: Option<Arc<RequestSnapshot>>,
    response: Option<Response>,
}

impl RequestError {
    fn new(kind: ErrorKind, message: impl Into<String>, cause: Option<Cause>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause,
            request: None,
            response: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message, None)
    }

    pub(crate) fn configuration_caused(message: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self::new(ErrorKind::Configuration, message, Some(cause.into()))
    }

    pub fn serialization(cause: serde_json::Error) -> Self {
        let message = format!("body serialization failed: {cause}");
        Self::new(ErrorKind::Serialization, message, Some(cause.into()))
    }

    pub fn transport(message: impl Into<String>, cause: Option<Cause>) -> Self {
        Self::new(ErrorKind::Transport, message, cause)
    }

    /// `request <METHOD> <url> timed out after <N> ms`, where `url` carries
    /// no query string.
    pub fn timeout(method: &str, url: &str, timeout_ms: u64) -> Self {
        let message = format!("request {method} {url} timed out after {timeout_ms} ms");
        Self::new(ErrorKind::Timeout, message, None)
    }

    /// A non-2xx response. The message is the status' reason phrase and the
    /// response stays attached for inspection.
    pub fn http_status(response: Response) -> Self {
        let message = crate::http::reason_phrase(response.status());
        let mut err = Self::new(ErrorKind::HttpStatus, message, None);
        err.response = Some(response);
        err
    }

    pub fn response_processing(message: impl Into<String>, cause: Option<Cause>) -> Self {
        Self::new(ErrorKind::ResponseProcessing, message, cause)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// The request that produced this error, when it got far enough to be
    /// snapshotted.
    pub fn request(&self) -> Option<&RequestSnapshot> {
        self.request.as_deref()
    }

    /// The response received before failing, if any.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub(crate) fn with_request(mut self, request: Arc<RequestSnapshot>) -> Self {
        self.request.get_or_insert(request);
        self
    }

    pub(crate) fn with_response(mut self, response: Response) -> Self {
        self.response.get_or_insert(response);
        self
    }
}
