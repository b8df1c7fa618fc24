//! HTTP vocabulary shared by the builder, the engine and transports.
//!
//! # Design
//! These types describe requests and responses as plain data. The builder
//! produces a `RequestHead`, a `Transport` turns it into bytes on the wire,
//! and the engine only ever sees `ResponseHead` values and body chunks coming
//! back. Nothing here performs I/O.
//!
//! `Target` is parsed once when a URL is configured and is never re-derived
//! while a request is in flight.

use std::fmt;

use http::{HeaderMap, StatusCode};
use url::Url;

/// Status assumed when a transport delivers a response without one.
pub const FALLBACK_STATUS: u16 = 500;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Upper-case wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
        }
    }
}

/// The parsed destination of a request.
///
/// `host` keeps the brackets of an IPv6 literal so it can be printed back
/// into a URL; use [`Target::connect_host`] when resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    scheme: String,
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
}

impl Target {
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(input)?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(url::ParseError::EmptyHost)?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or(url::ParseError::InvalidPort)?;

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port,
            path: url.path().to_string(),
            query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string that was part of the configured URL, without the `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Host name suitable for a socket lookup (IPv6 brackets removed).
    pub fn connect_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// Value for the `Host` header. The port is omitted when it is the
    /// scheme's default.
    pub fn authority(&self) -> String {
        let default_port = match self.scheme.as_str() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        };
        if default_port == Some(self.port) {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// `scheme://host/path`, with neither port nor query. This is the form
    /// used in diagnostics and timeout messages.
    pub fn display_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }

    /// Path plus the URL's own query, followed by `extra` query pairs.
    pub fn path_and_query(&self, extra: &str) -> String {
        match (self.query.as_deref(), extra.is_empty()) {
            (None, true) => self.path.clone(),
            (None, false) => format!("{}?{extra}", self.path),
            (Some(own), true) => format!("{}?{own}", self.path),
            (Some(own), false) => format!("{}?{own}&{extra}", self.path),
        }
    }
}

/// Everything a transport needs to put a request on the wire, except the
/// body, which is streamed through the connection afterwards.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub target: Target,
    pub path_and_query: String,
    pub headers: HeaderMap,
}

/// Status line and headers of a response, as reported by a transport.
///
/// `status` is `None` when the transport could not determine one.
#[derive(Debug, Clone, Default)]
pub struct ResponseHead {
    pub status: Option<u16>,
    pub headers: HeaderMap,
}

/// Standard reason phrase for `status`.
pub fn reason_phrase(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Unknown Status {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_url_parts() {
        let target = Target::parse("http://localhost:3000/foo/bar?a=1").unwrap();
        assert_eq!(target.scheme(), "http");
        assert_eq!(target.host(), "localhost");
        assert_eq!(target.port(), 3000);
        assert_eq!(target.path(), "/foo/bar");
        assert_eq!(target.query(), Some("a=1"));
    }

    #[test]
    fn parse_uses_scheme_default_port() {
        assert_eq!(Target::parse("http://example.com/").unwrap().port(), 80);
        assert_eq!(Target::parse("https://example.com/").unwrap().port(), 443);
    }

    #[test]
    fn parse_rejects_relative_url() {
        assert!(Target::parse("/foo").is_err());
    }

    #[test]
    fn display_url_drops_port_and_query() {
        let target = Target::parse("http://localhost:3000/foo?x=1").unwrap();
        assert_eq!(target.display_url(), "http://localhost/foo");
    }

    #[test]
    fn authority_omits_default_port() {
        assert_eq!(Target::parse("http://a.test/").unwrap().authority(), "a.test");
        assert_eq!(
            Target::parse("http://a.test:8080/").unwrap().authority(),
            "a.test:8080"
        );
    }

    #[test]
    fn ipv6_host_keeps_brackets_for_display_only() {
        let target = Target::parse("http://[::1]:9000/x").unwrap();
        assert_eq!(target.host(), "[::1]");
        assert_eq!(target.connect_host(), "::1");
    }

    #[test]
    fn path_and_query_appends_extra_pairs() {
        let plain = Target::parse("http://h/p").unwrap();
        assert_eq!(plain.path_and_query(""), "/p");
        assert_eq!(plain.path_and_query("a=1"), "/p?a=1");

        let with_query = Target::parse("http://h/p?z=9").unwrap();
        assert_eq!(with_query.path_and_query(""), "/p?z=9");
        assert_eq!(with_query.path_and_query("a=1"), "/p?z=9&a=1");
    }

    #[test]
    fn reason_phrases() {
        assert_eq!(reason_phrase(500), "Internal Server Error");
        assert_eq!(reason_phrase(404), "Not Found");
        assert_eq!(reason_phrase(300), "Multiple Choices");
        assert_eq!(reason_phrase(199), "Unknown Status 199");
    }

    #[test]
    fn method_names_are_upper_case() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(http::Method::from(Method::Delete), http::Method::DELETE);
    }
}
