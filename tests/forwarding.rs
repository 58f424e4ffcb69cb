//! Integration tests for buffered forwarding and fixed routes.

use std::time::{Duration, Instant};

use axum::{
    extract::RawQuery,
    http::{HeaderMap, StatusCode as AxumStatus},
    response::IntoResponse,
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use relay_proxy::config::{RelayConfig, RouteConfig};

mod common;

fn headers_as_json(headers: &HeaderMap) -> Value {
    let map = headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), json!(v.to_str().unwrap_or(""))))
        .collect::<serde_json::Map<_, _>>();
    Value::Object(map)
}

async fn echo_backend() -> std::net::SocketAddr {
    let app = Router::new()
        .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
        .route(
            "/query",
            get(|RawQuery(q): RawQuery| async move { q.unwrap_or_default() }),
        )
        .route(
            "/headers",
            any(|headers: HeaderMap| async move { Json(headers_as_json(&headers)) }),
        )
        .route(
            "/noisy",
            get(|| async {
                (
                    [
                        ("content-type", "text/plain"),
                        ("etag", "\"v1\""),
                        ("set-cookie", "sid=1"),
                        ("x-backend", "a"),
                    ],
                    "noisy",
                )
                    .into_response()
            }),
        )
        .route(
            "/items",
            get(|RawQuery(q): RawQuery| async move {
                (AxumStatus::CREATED, format!("items {}", q.unwrap_or_default()))
            }),
        );
    common::spawn_backend(app).await
}

#[tokio::test]
async fn test_unresolvable_host_is_bad_gateway() {
    let mut config = RelayConfig::default();
    config.timeouts.forward_secs = 10;
    let relay = common::spawn_relay(config).await;

    let res = common::client()
        .get(relay.url("/proxy"))
        .query(&[("url", "http://relay-proxy-test.invalid/")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    assert_eq!(
        res.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Bad Gateway");
    assert!(body["message"].is_string());
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_refused_connection_is_bad_gateway() {
    let relay = common::spawn_relay(RelayConfig::default()).await;
    let closed = common::closed_port().await;

    let res = common::client()
        .get(relay.url("/proxy"))
        .query(&[("url", format!("http://{}/", closed))])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn test_invalid_or_missing_target_is_bad_request() {
    let relay = common::spawn_relay(RelayConfig::default()).await;
    let client = common::client();

    let res = client
        .get(relay.url("/proxy"))
        .query(&[("url", "ftp://files.example.com/a")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Bad Request");

    let res = client.get(relay.url("/proxy")).send().await.unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_json_post_is_echoed_decoded() {
    let backend = echo_backend().await;
    let relay = common::spawn_relay(RelayConfig::default()).await;
    let payload = json!({"name": "relay", "tags": ["a", "b"], "n": 3});

    let res = common::client()
        .post(relay.url("/proxy"))
        .query(&[("url", format!("http://{}/echo", backend))])
        .json(&payload)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(res
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("application/json"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, payload);
}

#[tokio::test]
async fn test_slow_target_times_out_and_connection_is_closed() {
    let (backend, closed) = common::spawn_silent_backend().await;
    let mut config = RelayConfig::default();
    config.timeouts.forward_secs = 1;
    let relay = common::spawn_relay(config).await;

    let started = Instant::now();
    let res = common::client()
        .get(relay.url("/proxy"))
        .query(&[("url", format!("http://{}/slow", backend))])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 504);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Gateway Timeout");

    let closed_at = tokio::time::timeout(Duration::from_secs(3), closed)
        .await
        .expect("upstream socket was never closed")
        .unwrap();
    assert!(closed_at.duration_since(started) >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_caller_query_is_forwarded_once() {
    let backend = echo_backend().await;
    let relay = common::spawn_relay(RelayConfig::default()).await;
    let client = common::client();

    let res = client
        .get(relay.url("/proxy"))
        .query(&[
            ("url", format!("http://{}/query?a=1", backend)),
            ("b", "2".to_string()),
            ("c", "x y".to_string()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "a=1&b=2&c=x+y");

    let target = format!("http://{}/query", backend);
    let res = client
        .get(relay.url("/proxy"))
        .query(&[("b", "2"), ("url", target.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "b=2");
}

#[tokio::test]
async fn test_outbound_headers_follow_allow_list() {
    let backend = echo_backend().await;
    let relay = common::spawn_relay(RelayConfig::default()).await;

    let res = common::client()
        .get(relay.url("/proxy"))
        .query(&[("url", format!("http://{}/headers", backend))])
        .header("authorization", "Bearer secret")
        .header("cookie", "session=abc")
        .header("x-requested-with", "XMLHttpRequest")
        .header("user-agent", "caller/1.0")
        .send()
        .await
        .unwrap();

    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["authorization"], "Bearer secret");
    assert_eq!(seen["x-requested-with"], "XMLHttpRequest");
    assert_eq!(seen["content-type"], "application/json");
    assert!(seen["user-agent"].as_str().unwrap().starts_with("relay-proxy/"));
    assert!(seen.get("cookie").is_none());
}

#[tokio::test]
async fn test_response_headers_follow_allow_list() {
    let backend = echo_backend().await;
    let relay = common::spawn_relay(RelayConfig::default()).await;

    let res = common::client()
        .get(relay.url("/proxy"))
        .query(&[("url", format!("http://{}/noisy", backend))])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers().get("etag").unwrap(), "\"v1\"");
    assert!(res.headers().get("set-cookie").is_none());
    assert!(res.headers().get("x-backend").is_none());
    assert!(res.headers().get("access-control-allow-methods").is_some());
    assert!(res.headers().get("x-request-id").is_some());
    assert_eq!(res.text().await.unwrap(), "noisy");
}

#[tokio::test]
async fn test_fixed_route_forwards_to_configured_target() {
    let backend = echo_backend().await;
    let mut config = RelayConfig::default();
    config.routes.push(RouteConfig {
        name: "inventory".into(),
        path_prefix: "/inventory".into(),
        target: format!("http://{}", backend),
    });
    let relay = common::spawn_relay(config).await;

    let res = common::client()
        .get(relay.url("/inventory/items?id=7"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(res.text().await.unwrap(), "items id=7");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let backend = echo_backend().await;
    let mut config = RelayConfig::default();
    config.listener.max_body_size = 16;
    let relay = common::spawn_relay(config).await;

    let res = common::client()
        .post(relay.url("/proxy"))
        .query(&[("url", format!("http://{}/echo", backend))])
        .json(&json!({"padding": "this body is longer than sixteen bytes"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
}

#[tokio::test]
async fn test_caller_disconnect_aborts_upstream() {
    let (backend, closed) = common::spawn_silent_backend().await;
    let relay = common::spawn_relay(RelayConfig::default()).await;

    let started = Instant::now();
    let res = common::client()
        .get(relay.url("/proxy"))
        .query(&[("url", format!("http://{}/slow", backend))])
        .timeout(Duration::from_millis(300))
        .send()
        .await;
    assert!(res.is_err());

    let closed_at = tokio::time::timeout(Duration::from_secs(5), closed)
        .await
        .expect("upstream socket outlived the caller")
        .unwrap();
    assert!(closed_at.duration_since(started) < Duration::from_secs(10));
}
