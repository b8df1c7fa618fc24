use std::io::Read;

use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with_state, gzip_payload, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reflects_method_path_and_body() {
    let resp = app()
        .oneshot(json_request("PATCH", "/foo", r#"{"a":[1,2]}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echoed = body_json(resp).await;
    assert_eq!(echoed["method"], "PATCH");
    assert_eq!(echoed["path"], "/foo");
    assert_eq!(echoed["body"], json!({"a": [1, 2]}));
}

#[tokio::test]
async fn echo_groups_repeated_query_names() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/foo?q1=v1&q1=v2&q2=v3")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    let echoed = body_json(resp).await;
    assert_eq!(echoed["query"], json!({"q1": ["v1", "v2"], "q2": "v3"}));
    assert_eq!(echoed["body"], Value::Null);
}

#[tokio::test]
async fn echo_reports_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/foo")
                .header("x-eggs", "spam")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    let echoed = body_json(resp).await;
    assert_eq!(echoed["headers"]["x-eggs"], "spam");
}

#[tokio::test]
async fn octet_stream_is_echoed_verbatim() {
    let payload: Vec<u8> = vec![0, 159, 146, 150, 255];
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/foo")
                .header(http::header::CONTENT_TYPE, "application/octet-stream")
                .body(axum::body::Body::from(payload.clone()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        resp.headers()[http::header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(&body_bytes(resp).await[..], &payload[..]);
}

// --- fixed routes ---

#[tokio::test]
async fn status_route_answers_with_requested_code() {
    let resp = app()
        .oneshot(Request::builder().uri("/status/503").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await, json!({"status": 503}));
}

#[tokio::test]
async fn gzip_route_serves_compressed_json() {
    let resp = app()
        .oneshot(Request::builder().uri("/gzip").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.headers()[http::header::CONTENT_ENCODING], "gzip");
    let compressed = body_bytes(resp).await;
    let mut plain = String::new();
    flate2::read::GzDecoder::new(&compressed[..])
        .read_to_string(&mut plain)
        .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&plain).unwrap(), gzip_payload());
}

#[tokio::test]
async fn empty_route_has_no_body() {
    let resp = app()
        .oneshot(Request::builder().uri("/empty").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn text_route_is_not_json() {
    let resp = app()
        .oneshot(Request::builder().uri("/text").body(String::new()).unwrap())
        .await
        .unwrap();

    let bytes = body_bytes(resp).await;
    assert!(serde_json::from_slice::<Value>(&bytes).is_err());
}

// --- state ---

#[tokio::test]
async fn hits_are_counted() {
    use tower::Service;

    let state = AppState::default();
    let mut app = app_with_state(state.clone()).into_service();

    for uri in ["/foo", "/empty", "/status/404"] {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(Request::builder().uri(uri).body(String::new()).unwrap())
            .await
            .unwrap();
        assert!(resp.status() == StatusCode::OK || resp.status() == StatusCode::NOT_FOUND);
    }
    assert_eq!(state.hits(), 3);
}
