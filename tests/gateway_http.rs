//! End-to-end HTTP tests against the in-process echo service.

mod common;

use common::{local_config, spawn_gateway};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_echo_binds_path_and_query() {
    let gw = spawn_gateway(local_config()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(gw.url("/v1/example/echo/foo?num=5"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/json");
    assert_eq!(resp.headers()["grpc-metadata-x-echo-method"], "Echo");
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"id": "foo", "num": 5}));
}

#[tokio::test]
async fn test_path_wins_over_query() {
    let gw = spawn_gateway(local_config()).await;
    let body: Value = reqwest::get(gw.url("/v1/example/echo/42/7?id=9&num=1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"id": "42", "num": 7}));
}

#[tokio::test]
async fn test_percent_encoded_capture() {
    let gw = spawn_gateway(local_config()).await;
    let body: Value = reqwest::get(gw.url("/v1/example/echo/a%2Fb/1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["id"], "a/b");
}

#[tokio::test]
async fn test_type_mismatch_names_field() {
    let gw = spawn_gateway(local_config()).await;
    let resp = reqwest::get(gw.url("/v1/example/echo/42/abc")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 3);
    assert_eq!(body["status"], "INVALID_ARGUMENT");
    assert!(body["message"].as_str().unwrap().contains("num"));
}

#[tokio::test]
async fn test_unmatched_routes() {
    let gw = spawn_gateway(local_config()).await;
    let client = reqwest::Client::new();

    let resp = client.get(gw.url("/v1/nothing/here")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "NOT_FOUND");

    // An empty segment never satisfies a capture.
    let resp = client.get(gw.url("/v1/example/echo//7")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .delete(gw.url("/v1/example/echo/42"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.headers()["allow"], "POST");
}

#[tokio::test]
async fn test_echo_body() {
    let gw = spawn_gateway(local_config()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(gw.url("/v1/example/echo_body"))
        .json(&json!({"id": "x", "num": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["grpc-metadata-x-echo-method"], "EchoBody");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"id": "x", "num": 3}));
}

#[tokio::test]
async fn test_echo_body_proto3_json_forms() {
    let gw = spawn_gateway(local_config()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(gw.url("/v1/example/echo_body"))
        .json(&json!({"id": "x", "num": "7"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"id": "x", "num": 7}));

    let resp = client
        .post(gw.url("/v1/example/echo_body"))
        .json(&json!({"id": null, "num": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"id": "", "num": 1}));
}

#[tokio::test]
async fn test_in_process_trailers_with_te() {
    let gw = spawn_gateway(local_config()).await;
    let resp = reqwest::Client::new()
        .get(gw.url("/v1/example/echo/1/2"))
        .header("te", "trailers")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["trailer"], "grpc-trailer-x-echo-served");
    assert!(!resp.headers().contains_key("grpc-metadata-x-echo-served"));
}

#[tokio::test]
async fn test_empty_body_is_zero_valued_request() {
    let gw = spawn_gateway(local_config()).await;
    let resp = reqwest::Client::new()
        .post(gw.url("/v1/example/echo_body"))
        .header("content-type", "application/json")
        .body("")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"id": "", "num": 0}));
}

#[tokio::test]
async fn test_body_rejections() {
    let gw = spawn_gateway(local_config()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(gw.url("/v1/example/echo_body"))
        .header("content-type", "application/json")
        .body("{\"id\":")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(gw.url("/v1/example/echo_body"))
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_body_size_limit() {
    let mut config = local_config();
    config.security.max_body_size = 64;
    let gw = spawn_gateway(config).await;

    let id = "x".repeat(256);
    let resp = reqwest::Client::new()
        .post(gw.url("/v1/example/echo_body"))
        .json(&json!({ "id": id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_metadata_round_trip() {
    let gw = spawn_gateway(local_config()).await;
    let resp = reqwest::Client::new()
        .get(gw.url("/v1/example/echo/1/2"))
        .header("grpc-metadata-echo-tag", "abc")
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["grpc-metadata-echo-tag"], "abc");
    assert_eq!(resp.headers()["x-request-id"], "req-42");
    // No `TE: trailers`, so the in-process trailer is dropped.
    assert!(!resp.headers().contains_key("trailer"));
}

#[tokio::test]
async fn test_grpc_timeout_header() {
    let gw = spawn_gateway(local_config()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(gw.url("/v1/example/echo/1/2"))
        .header("grpc-timeout", "5S")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(gw.url("/v1/example/echo/1/2"))
        .header("grpc-timeout", "forever")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_method_override() {
    let gw = spawn_gateway(local_config()).await;
    let resp = reqwest::Client::new()
        .post(gw.url("/v1/example/echo/42/7"))
        .header("x-http-method-override", "GET")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["num"], 7);
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let gw = spawn_gateway(local_config()).await;
    gw.shutdown.trigger();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), gw.server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
