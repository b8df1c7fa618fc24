//! Echo server used as the receiving end of requests in tests.
//!
//! Every path not listed below echoes the request back as JSON:
//! `{"method", "path", "query", "headers", "body"}`. A request sent as
//! `application/octet-stream` is echoed back verbatim instead. A `delay`
//! query parameter (milliseconds) holds the response back.
//!
//! - `/status/{code}` answers with `code` and `{"status": code}`
//! - `/gzip` answers with a gzip-compressed JSON document
//! - `/empty` answers 200 with no body
//! - `/text` answers with a plain-text body that is not JSON

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use flate2::{write::GzEncoder, Compression};
use serde_json::{json, Map, Value};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Shared state: how many requests the server has seen.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    hits: Arc<AtomicUsize>,
}

impl AppState {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// JSON document served compressed by `/gzip`.
pub fn gzip_payload() -> Value {
    json!({"hello": "world", "items": [1, 2, 3], "nested": {"ok": true}})
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/status/{code}", get(status).post(status))
        .route("/gzip", get(gzip_json))
        .route("/empty", get(empty))
        .route("/text", get(text))
        .fallback(echo)
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock server listening");
    }
    axum::serve(listener, app_with_state(state)).await
}

/// Accept connections, read whatever arrives first, then drop the socket
/// without answering.
pub async fn hang_up(listener: TcpListener) -> Result<(), std::io::Error> {
    loop {
        let (mut socket, peer) = listener.accept().await?;
        let mut buf = [0u8; 1024];
        let read = socket.read(&mut buf).await.unwrap_or(0);
        debug!(%peer, read, "hanging up");
        drop(socket);
    }
}

/// Decode a raw query string. A name seen once maps to a string, a
/// repeated name maps to a list of its values in order.
pub fn parse_query(raw: &str) -> Map<String, Value> {
    let mut query = Map::new();
    for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let value = Value::String(value.into_owned());
        match query.get_mut(&*name) {
            None => {
                query.insert(name.into_owned(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    query
}

async fn echo(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let query = parse_query(raw_query.as_deref().unwrap_or_default());

    if let Some(delay) = query.get("delay").and_then(Value::as_str) {
        if let Ok(ms) = delay.parse::<u64>() {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type == "application/octet-stream" {
        return ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response();
    }

    let echoed_headers: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), Value::String(value))
        })
        .collect();
    let echoed_body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": query,
        "headers": echoed_headers,
        "body": echoed_body,
    }))
    .into_response()
}

async fn status(State(state): State<AppState>, Path(code): Path<u16>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match StatusCode::from_u16(code) {
        Ok(status) => (status, Json(json!({"status": code}))).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn gzip_json(State(state): State<AppState>) -> Result<Response, StatusCode> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let plain = serde_json::to_vec(&gzip_payload()).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&plain)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let compressed = encoder
        .finish()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        compressed,
    )
        .into_response())
}

async fn empty(State(state): State<AppState>) -> StatusCode {
    state.hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn text(State(state): State<AppState>) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "text/plain")], "just some text, {not json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_values_stay_scalar() {
        let query = parse_query("q2=v3");
        assert_eq!(Value::Object(query), json!({"q2": "v3"}));
    }

    #[test]
    fn repeated_values_become_lists_in_order() {
        let query = parse_query("q1=v1&q1=v2&q2=v3&q1=v4");
        assert_eq!(
            Value::Object(query),
            json!({"q1": ["v1", "v2", "v4"], "q2": "v3"})
        );
    }

    #[test]
    fn values_are_percent_decoded() {
        let query = parse_query("a+b=c%26d");
        assert_eq!(Value::Object(query), json!({"a b": "c&d"}));
    }

    #[test]
    fn empty_query_is_empty_map() {
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn gzip_payload_is_an_object() {
        assert!(gzip_payload().is_object());
    }
}
