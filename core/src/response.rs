//! The value a request settles with.

use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;

use crate::http::ResponseHead;
use crate::http::FALLBACK_STATUS;

/// Decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The body parsed as JSON.
    Json(serde_json::Value),
    /// The raw body: binary mode was on, the body was empty, or it was not
    /// valid JSON.
    Bytes(Bytes),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Bytes(bytes) => Some(bytes),
        }
    }
}

/// A fully received response. Built once the body stream has been drained
/// and never modified afterwards.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    raw: Bytes,
    body: ResponseBody,
    is_binary: bool,
}

impl Response {
    /// Assemble a response from its head and decoded bytes.
    ///
    /// JSON decoding is attempted unless `binary` is set or the body is
    /// empty; a body that does not parse is kept as bytes.
    pub fn assemble(head: ResponseHead, raw: Bytes, binary: bool) -> Self {
        let body = if binary || raw.is_empty() {
            ResponseBody::Bytes(raw.clone())
        } else {
            match serde_json::from_slice(&raw) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Bytes(raw.clone()),
            }
        };

        Self {
            status: head.status.unwrap_or(FALLBACK_STATUS),
            headers: head.headers,
            raw,
            body,
            is_binary: binary,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn is_binary(&self) -> bool {
        self.is_binary
    }

    /// The decoded body bytes, regardless of how they were interpreted.
    pub fn bytes(&self) -> &Bytes {
        &self.raw
    }

    /// Body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }

    /// Deserialize the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            ResponseBody::Json(value) => T::deserialize(value),
            ResponseBody::Bytes(bytes) => serde_json::from_slice(bytes),
        }
    }
}
