//! Response body accumulation with optional gzip inflation.
//!
//! The decoder is chosen from the response headers once, then fed every
//! chunk the transport delivers. Inflation is streaming: chunks are
//! decompressed as they arrive instead of being buffered compressed.
//! A body may hold several concatenated gzip members; they decode to the
//! concatenation of their contents. Errors from a corrupt stream are
//! returned to the caller, which routes them to the same failure path as
//! transport errors.

use std::io::{self, Write};

use bytes::Bytes;
use flate2::write::MultiGzDecoder;
use http::header::CONTENT_ENCODING;
use http::HeaderMap;

/// True when `Content-Encoding` is `gzip`, ignoring case and surrounding
/// whitespace.
pub fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("gzip"))
}

/// Accumulates a response body, inflating it when needed.
pub enum BodyDecoder {
    Identity(Vec<u8>),
    Gzip { inner: MultiGzDecoder<Vec<u8>>, fed: usize },
}

impl BodyDecoder {
    pub fn for_headers(headers: &HeaderMap) -> Self {
        if is_gzip(headers) {
            BodyDecoder::Gzip {
                inner: MultiGzDecoder::new(Vec::new()),
                fed: 0,
            }
        } else {
            BodyDecoder::Identity(Vec::new())
        }
    }

    pub fn is_gzip(&self) -> bool {
        matches!(self, BodyDecoder::Gzip { .. })
    }

    pub fn push(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            BodyDecoder::Identity(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            BodyDecoder::Gzip { inner, fed } => {
                *fed += chunk.len();
                inner.write_all(chunk)
            }
        }
    }

    /// Flush the decoder and return the decoded body.
    ///
    /// A gzip-labelled response with no bytes at all decodes to an empty body.
    pub fn finish(self) -> io::Result<Bytes> {
        match self {
            BodyDecoder::Identity(buf) => Ok(Bytes::from(buf)),
            BodyDecoder::Gzip { fed: 0, .. } => Ok(Bytes::new()),
            BodyDecoder::Gzip { inner, .. } => inner.finish().map(Bytes::from),
        }
    }
}
