//! Fluent request descriptor.
//!
//! # Design
//! `Request` accumulates configuration through `&mut self` setters that
//! return `&mut Self`, so calls chain. Nothing is validated while
//! configuring: a malformed URL or header is remembered and reported as a
//! `Configuration` error when the request starts, before any I/O.
//!
//! Starting is lazy and happens once. The first `start()` (or the first
//! `.await`) takes an immutable [`RequestSnapshot`] and dispatches it; the
//! resulting [`Outcome`] is memoized, so awaiting the same `Request` again
//! observes the same execution. Changes made after the start have no
//! effect on that execution.

use std::fmt;
use std::future::IntoFuture;
use std::sync::{Arc, OnceLock};

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use futures::future::BoxFuture;
use http::header::{ACCEPT_ENCODING, AUTHORIZATION};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::body::Body;
use crate::engine;
use crate::error::{Cause, RequestError};
use crate::http::{Method, RequestHead, Target};
use crate::outcome::{Inspection, Outcome};
use crate::response::Response;
use crate::tcp::TcpTransport;
use crate::transport::Transport;

/// Value accumulated for one query parameter name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Many(Vec<String>),
}

impl QueryValue {
    pub fn values(&self) -> &[String] {
        match self {
            QueryValue::Single(value) => std::slice::from_ref(value),
            QueryValue::Many(values) => values,
        }
    }
}

/// Query parameters in first-insertion order of their names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, QueryValue)>,
}

impl QueryParams {
    /// Add `value` under `name`. A second value for the same name turns the
    /// entry into a list; later values are appended to it.
    pub fn push(&mut self, name: &str, value: &str) {
        let value = value.to_string();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            None => self.entries.push((name.to_string(), QueryValue::Single(value))),
            Some((_, slot)) => match slot {
                QueryValue::Many(values) => values.push(value),
                QueryValue::Single(first) => {
                    *slot = QueryValue::Many(vec![std::mem::take(first), value]);
                }
            },
        }
    }

    pub fn get(&self, name: &str) -> Option<&QueryValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `name=value` pairs joined by `&`, repeated names in insertion order.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.entries {
            for v in value.values() {
                serializer.append_pair(name, v);
            }
        }
        serializer.finish()
    }
}

/// Immutable copy of a request taken when it is dispatched.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    method: Method,
    target: Target,
    query: QueryParams,
    headers: HeaderMap,
    body: Option<Body>,
    binary: bool,
    timeout_ms: u64,
}

impl RequestSnapshot {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// URL without port or query, as used in diagnostics.
    pub fn display_url(&self) -> String {
        self.target.display_url()
    }

    pub fn head(&self) -> RequestHead {
        RequestHead {
            method: self.method,
            target: self.target.clone(),
            path_and_query: self.target.path_and_query(&self.query.encode()),
            headers: self.headers.clone(),
        }
    }
}

impl fmt::Display for RequestSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.display_url())
    }
}

/// A request under construction.
pub struct Request {
    transport: Arc<dyn Transport>,
    method: Option<Method>,
    url: Option<String>,
    target: Option<Result<Target, url::ParseError>>,
    headers: HeaderMap,
    query: QueryParams,
    body: Option<Body>,
    binary: bool,
    timeout_ms: u64,
    invalid: Option<RequestError>,
    started: OnceLock<Outcome>,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// An empty request sent over the default TCP transport.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(TcpTransport))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            method: None,
            url: None,
            target: None,
            headers: HeaderMap::new(),
            query: QueryParams::default(),
            body: None,
            binary: false,
            timeout_ms: 0,
            invalid: None,
            started: OnceLock::new(),
        }
    }

    pub fn method(&mut self, method: Method) -> &mut Self {
        self.method = Some(method);
        self
    }

    /// Set the target URL. Parse errors surface when the request starts.
    pub fn url(&mut self, url: &str) -> &mut Self {
        self.url = Some(url.to_string());
        self.target = Some(Target::parse(url));
        self
    }

    pub fn get(&mut self, url: &str) -> &mut Self {
        self.method(Method::Get).url(url)
    }

    pub fn post(&mut self, url: &str) -> &mut Self {
        self.method(Method::Post).url(url)
    }

    pub fn put(&mut self, url: &str) -> &mut Self {
        self.method(Method::Put).url(url)
    }

    pub fn patch(&mut self, url: &str) -> &mut Self {
        self.method(Method::Patch).url(url)
    }

    pub fn delete(&mut self, url: &str) -> &mut Self {
        self.method(Method::Delete).url(url)
    }

    /// Set a header, replacing any previous value for the same name.
    pub fn set(&mut self, name: &str, value: &str) -> &mut Self {
        let Ok(header) = HeaderName::from_bytes(name.as_bytes()) else {
            return self.invalid(RequestError::configuration_caused(
                format!("invalid header name {name:?}"),
                Cause::HeaderName(name.to_string()),
            ));
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            return self.invalid(RequestError::configuration_caused(
                format!("invalid value for header {name:?}"),
                Cause::HeaderValue(name.to_string()),
            ));
        };
        self.headers.insert(header, value);
        self
    }

    /// Add a query parameter. Repeating a name accumulates its values.
    pub fn query(&mut self, name: &str, value: &str) -> &mut Self {
        self.query.push(name, value);
        self
    }

    /// Set the body and recompute `Content-Type` and `Content-Length`.
    pub fn send(&mut self, body: impl Into<Body>) -> &mut Self {
        let body = body.into();
        body.apply_headers(&mut self.headers);
        self.body = Some(body);
        self
    }

    /// Basic authentication, sent as `Authorization: Basic <base64(user:pass)>`.
    pub fn auth(&mut self, user: &str, password: &str) -> &mut Self {
        let encoded = BASE64_STANDARD.encode(format!("{user}:{password}"));
        match HeaderValue::from_str(&format!("Basic {encoded}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
                self
            }
            Err(_) => self.invalid(RequestError::configuration_caused(
                "invalid basic auth credentials",
                Cause::HeaderValue(AUTHORIZATION.to_string()),
            )),
        }
    }

    /// Return the response body as raw bytes instead of decoding JSON.
    pub fn binary(&mut self, binary: bool) -> &mut Self {
        self.binary = binary;
        self
    }

    /// Timeout in milliseconds covering the whole exchange; 0 disables it.
    pub fn timeout(&mut self, timeout_ms: u64) -> &mut Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn invalid(&mut self, err: RequestError) -> &mut Self {
        self.invalid.get_or_insert(err);
        self
    }

    pub fn is_started(&self) -> bool {
        self.started.get().is_some()
    }

    /// Take an immutable copy of the current configuration.
    pub fn snapshot(&self) -> Result<RequestSnapshot, RequestError> {
        if let Some(err) = &self.invalid {
            return Err(err.clone());
        }
        let method = self
            .method
            .ok_or_else(|| RequestError::configuration("request has no method"))?;
        let target = match &self.target {
            None => return Err(RequestError::configuration("request has no target url")),
            Some(Err(err)) => {
                let url = self.url.as_deref().unwrap_or_default();
                return Err(RequestError::configuration_caused(
                    format!("invalid url {url:?}: {err}"),
                    *err,
                ));
            }
            Some(Ok(target)) => target.clone(),
        };

        let mut headers = self.headers.clone();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        Ok(RequestSnapshot {
            method,
            target,
            query: self.query.clone(),
            headers,
            body: self.body.clone(),
            binary: self.binary,
            timeout_ms: self.timeout_ms,
        })
    }

    /// Dispatch the request if it has not been dispatched yet, and return
    /// its outcome.
    ///
    /// Configuration errors are returned here, synchronously. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> Result<Outcome, RequestError> {
        if let Some(outcome) = self.started.get() {
            return Ok(outcome.clone());
        }
        let snapshot = self.snapshot()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            RequestError::configuration("requests must be started inside a tokio runtime")
        })?;
        let outcome = self.started.get_or_init(|| {
            engine::dispatch(&runtime, Arc::clone(&self.transport), Arc::new(snapshot))
        });
        Ok(outcome.clone())
    }

    /// Wait for the result and report it as a value instead of an error.
    pub async fn reflect(&self) -> Inspection {
        match self.start() {
            Ok(outcome) => outcome.reflect().await,
            Err(err) => Inspection::Rejected(err),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.method, &self.target) {
            (Some(method), Some(Ok(target))) => write!(f, "{method} {}", target.display_url()),
            (method, _) => write!(
                f,
                "{} {}",
                method.map(|m| m.as_str()).unwrap_or("?"),
                self.url.as_deref().unwrap_or("?")
            ),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("binary", &self.binary)
            .field("timeout_ms", &self.timeout_ms)
            .field("started", &self.is_started())
            .finish()
    }
}

impl<'a> IntoFuture for &'a Request {
    type Output = Result<Response, RequestError>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.start()?.wait().await })
    }
}

impl<'a> IntoFuture for &'a mut Request {
    type Output = Result<Response, RequestError>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        (&*self).into_future()
    }
}

impl IntoFuture for Request {
    type Output = Result<Response, RequestError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.start()?.wait().await })
    }
}
