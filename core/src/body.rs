//! Outgoing request bodies.
//!
//! The caller picks the variant: `Body::Raw` is sent verbatim as
//! `application/octet-stream`, `Body::Json` carries already-encoded JSON
//! text sent as `application/json`. Encoding happens in [`Body::json`], so a
//! value that cannot be serialized fails there, before anything touches the
//! network.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use serde::Serialize;

use crate::error::RequestError;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Raw(Bytes),
    Json(Bytes),
}

impl Body {
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Body::Raw(bytes.into())
    }

    /// Serialize `value` to JSON text.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, RequestError> {
        let encoded = serde_json::to_vec(value).map_err(RequestError::serialization)?;
        Ok(Body::Json(Bytes::from(encoded)))
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Raw(_) => OCTET_STREAM,
            Body::Json(_) => APPLICATION_JSON,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        match self {
            Body::Raw(bytes) | Body::Json(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Wire bytes and matching content type.
    pub fn encode(&self) -> (Bytes, &'static str) {
        (self.bytes().clone(), self.content_type())
    }

    /// Overwrite `Content-Type` and `Content-Length` to describe this body.
    pub(crate) fn apply_headers(&self, headers: &mut HeaderMap) {
        let (bytes, content_type) = self.encode();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Raw(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Raw(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Raw(Bytes::from_static(bytes))
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(Bytes::from(value.to_string()))
    }
}
