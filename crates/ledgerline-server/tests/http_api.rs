// ledgerline-server/tests/http_api.rs
// ============================================================================
// Module: HTTP API Tests
// Description: End-to-end behavior of the Ledgerline HTTP surface.
// Purpose: Validate routing, status mapping, and ingest-to-notification flow.
// Dependencies: ledgerline-server, axum, tower, http-body-util
// ============================================================================

//! ## Overview
//! Requests go through [`tower::ServiceExt::oneshot`] against the router built
//! by [`ledgerline_server::LedgerlineServer`]. Notification tests run the
//! dispatcher against an axum watcher stub bound to `127.0.0.1:0`.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::StatusCode;
use axum::routing::post;
use http_body_util::BodyExt;
use ledgerline_config::LedgerlineConfig;
use ledgerline_core::ContentStore;
use ledgerline_core::DEFAULT_HASH_ALGORITHM;
use ledgerline_core::EntityId;
use ledgerline_core::Version;
use ledgerline_core::WatcherUrl;
use ledgerline_core::core::hashing::encode_canonical;
use ledgerline_server::LedgerlineServer;
use serde_json::Value;
use serde_json::json;
use tokio::sync::oneshot;
use tower::ServiceExt;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const QUIET_CONFIG: &str = "[dispatch]\nenabled = false\n[audit]\nsink = \"noop\"\n";

fn server(toml: &str) -> LedgerlineServer {
    LedgerlineServer::from_config(LedgerlineConfig::from_toml(toml).unwrap()).unwrap()
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: impl Into<Body>) -> Reply {
    let request = Request::builder().method(method).uri(uri).body(body.into()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    Reply {
        status,
        headers,
        body,
    }
}

async fn post_json(app: &Router, uri: &str, value: &Value) -> Reply {
    send(app, "POST", uri, serde_json::to_vec(value).unwrap()).await
}

// ============================================================================
// SECTION: Store and Read
// ============================================================================

/// Tests identical payloads share a pointer across versions.
#[tokio::test]
async fn identical_payloads_share_pointer() {
    let app = server(QUIET_CONFIG).router();
    let first = post_json(&app, "/entity/e1", &json!({"a": 1})).await;
    let second = post_json(&app, "/entity/e1", &json!({"a": 1})).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["version"], 1);
    assert_eq!(second.json()["version"], 2);
    assert_eq!(first.json()["pointer"], second.json()["pointer"]);

    let history = send(&app, "GET", "/entity/e1/history", Body::empty()).await.json();
    let entries = history["history"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["vsn"], 2);
    assert_eq!(entries[1]["vsn"], 1);
    assert_eq!(entries[0]["pointer"], entries[1]["pointer"]);
}

/// Tests reads return the latest payload with its media type.
#[tokio::test]
async fn read_returns_latest_payload() {
    let app = server(QUIET_CONFIG).router();
    post_json(&app, "/entity/e1", &json!({"a": 1})).await;
    let put = send(&app, "PUT", "/entity/e1", r#"{"a": 2}"#).await;
    assert_eq!(put.status, StatusCode::OK);

    let read = send(&app, "GET", "/entity/e1", Body::empty()).await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.headers["content-type"], "application/json");
    assert_eq!(read.headers["x-ledgerline-version"], "2");
    assert_eq!(read.json(), json!({"a": 2}));

    let history = send(&app, "GET", "/entity/e1/history", Body::empty()).await.json();
    let entries = history["history"].as_array().unwrap();
    assert_ne!(entries[0]["pointer"], entries[1]["pointer"]);
    assert_eq!(entries[0]["pointer"], put.json()["pointer"]);
}

/// Tests missing entities are 404 on both read paths.
#[tokio::test]
async fn unknown_entity_is_not_found() {
    let app = server(QUIET_CONFIG).router();
    assert_eq!(send(&app, "GET", "/entity/nope", Body::empty()).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        send(&app, "GET", "/entity-ptr/nope", Body::empty()).await.status,
        StatusCode::NOT_FOUND
    );
    let history = send(&app, "GET", "/entity/nope/history", Body::empty()).await;
    assert_eq!(history.status, StatusCode::OK);
    assert_eq!(history.json(), json!({"history": []}));
}

/// Tests store-by-pointer records the raw body and rejects an empty one.
#[tokio::test]
async fn store_by_pointer_round_trips_raw_bytes() {
    let app = server(QUIET_CONFIG).router();
    let empty = send(&app, "POST", "/entity-ptr/e2", Body::empty()).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, "GET", "/entity-ptr/e2", Body::empty()).await.status, StatusCode::NOT_FOUND);

    let pointer = vec![0xde, 0xad, 0xbe, 0xef];
    let stored = send(&app, "POST", "/entity-ptr/e2", pointer.clone()).await;
    assert_eq!(stored.status, StatusCode::OK);
    assert_eq!(stored.json()["pointer"], "3q2+7w==");

    let read = send(&app, "GET", "/entity-ptr/e2", Body::empty()).await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body, pointer);
    assert_eq!(read.headers["x-ledgerline-version"], "1");
}

/// Tests caller-supplied versions and stale rejection.
#[tokio::test]
async fn explicit_versions() {
    let app = server(QUIET_CONFIG).router();
    let exact = post_json(&app, "/entity/e1?version=10", &json!({"v": 10})).await;
    assert_eq!(exact.json()["version"], 10);
    let next = post_json(&app, "/entity/e1", &json!({"v": 11})).await;
    assert_eq!(next.json()["version"], 11);
    let stale = post_json(&app, "/entity/e1?version=5", &json!({"v": 5})).await;
    assert_eq!(stale.status, StatusCode::BAD_REQUEST);
    let zero = post_json(&app, "/entity/e1?version=0", &json!({"v": 0})).await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);
    let bogus = post_json(&app, "/entity/e1?version=abc", &json!({"v": 0})).await;
    assert_eq!(bogus.status, StatusCode::BAD_REQUEST);
    for huge in ["18446744073709551615", "9223372036854775808"] {
        let reply = post_json(&app, &format!("/entity/e1?version={huge}"), &json!({"v": 0})).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        let reply = send(&app, "POST", &format!("/entity-ptr/e1?version={huge}"), "ptr").await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }
    let history = send(&app, "GET", "/entity/e1/history", Body::empty()).await.json();
    assert_eq!(history["history"].as_array().unwrap().len(), 2);
}

/// Tests a content collision is reported as a conflict.
#[tokio::test]
async fn content_collision_is_conflict() {
    let server = server(QUIET_CONFIG);
    let payload = json!({"a": 1});
    let (_, fingerprint) = encode_canonical(DEFAULT_HASH_ALGORITHM, &payload).unwrap();
    server.service().backend().content.insert(&fingerprint, b"other bytes").unwrap();
    let app = server.router();

    let reply = post_json(&app, "/entity/e1", &payload).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(reply.json()["error"].as_str().unwrap().contains("conflict"));
    assert_eq!(send(&app, "GET", "/entity/e1", Body::empty()).await.status, StatusCode::NOT_FOUND);
}

/// Tests malformed input is rejected.
#[tokio::test]
async fn malformed_requests_are_rejected() {
    let app = server(QUIET_CONFIG).router();
    let invalid = send(&app, "POST", "/entity/e1", "{not json").await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert!(invalid.json()["error"].as_str().unwrap().contains("invalid json"));
    let limit = send(&app, "GET", "/entity/e1/history?limit=0", Body::empty()).await;
    assert_eq!(limit.status, StatusCode::BAD_REQUEST);
    let limit = send(&app, "GET", "/entity/e1/history?limit=1001", Body::empty()).await;
    assert_eq!(limit.status, StatusCode::BAD_REQUEST);
}

/// Tests oversized bodies are refused.
#[tokio::test]
async fn body_limit_is_enforced() {
    let app = server(&format!("[server]\nmax_body_bytes = 32\n{QUIET_CONFIG}")).router();
    let big = json!({"padding": "x".repeat(64)});
    let reply = post_json(&app, "/entity/e1", &big).await;
    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
    let small = post_json(&app, "/entity/e1", &json!({"a": 1})).await;
    assert_eq!(small.status, StatusCode::OK);
}

// ============================================================================
// SECTION: Watches and Health
// ============================================================================

/// Tests single and batch watch registration.
#[tokio::test]
async fn watch_endpoints_validate_and_register() {
    let ledgerline = server(QUIET_CONFIG);
    let app = ledgerline.router();
    let bad = post_json(&app, "/entity/e1/watch", &json!({"url": "ftp://nope"})).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    let ok = post_json(&app, "/entity/e1/watch", &json!({"url": "http://w.local/a"})).await;
    assert_eq!(ok.status, StatusCode::NO_CONTENT);

    let batch = json!({"to_watch": [
        {"entity": "e2", "url": "http://w.local/b"},
        {"entity": "", "url": "http://w.local/c"},
    ]});
    assert_eq!(post_json(&app, "/watchMultiple", &batch).await.status, StatusCode::BAD_REQUEST);
    let watches = &ledgerline.service().backend().watches;
    assert!(watches.watchers(&EntityId::new("e2")).unwrap().is_empty());

    let batch = json!({"to_watch": [
        {"entity": "e2", "url": "http://w.local/b"},
        {"entity": "e3", "url": "http://w.local/b"},
    ]});
    assert_eq!(post_json(&app, "/watchMultiple", &batch).await.status, StatusCode::NO_CONTENT);
    assert_eq!(watches.watched_entities().unwrap().len(), 3);

    assert_eq!(post_json(&app, "/unwatchMultiple", &batch).await.status, StatusCode::NO_CONTENT);
    let unwatch = post_json(&app, "/entity/e1/unwatch", &json!({"url": "http://w.local/a"})).await;
    assert_eq!(unwatch.status, StatusCode::NO_CONTENT);
    assert!(watches.watched_entities().unwrap().is_empty());
}

/// Tests liveness and readiness checks.
#[tokio::test]
async fn health_checks_report_status() {
    let app = server(QUIET_CONFIG).router();
    assert_eq!(send(&app, "GET", "/healthz", Body::empty()).await.json(), json!({"health": true}));
    assert_eq!(send(&app, "GET", "/readyz", Body::empty()).await.json(), json!({"ready": true}));
}

// ============================================================================
// SECTION: Notification Flow
// ============================================================================

#[derive(Default)]
struct Captured {
    bodies: Mutex<Vec<Value>>,
}

async fn capture(State(captured): State<Arc<Captured>>, Json(body): Json<Value>) -> StatusCode {
    captured.bodies.lock().unwrap().push(body);
    StatusCode::OK
}

async fn spawn_watcher(captured: Arc<Captured>) -> (String, oneshot::Sender<()>) {
    let app = Router::new().route("/hook", post(capture)).with_state(captured);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    (format!("http://{addr}/hook"), shutdown_tx)
}

/// Tests a watcher is notified after ingest and its cursor advances.
#[tokio::test]
async fn ingest_notifies_watcher() {
    let captured = Arc::new(Captured::default());
    let (hook, stop_watcher) = spawn_watcher(captured.clone()).await;
    let ledgerline = server("[audit]\nsink = \"noop\"\n");
    let app = ledgerline.router();

    post_json(&app, "/entity/e1/watch", &json!({"url": hook})).await;
    post_json(&app, "/entity/e1", &json!({"a": 1})).await;
    post_json(&app, "/entity/e1", &json!({"a": 2})).await;

    let dispatcher = ledgerline.dispatcher().unwrap();
    let report = dispatcher.run_cycle().await.unwrap().unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(captured.bodies.lock().unwrap().clone(), vec![json!({"entity": "e1"})]);
    let cursor = ledgerline
        .service()
        .backend()
        .watches
        .cursor(&EntityId::new("e1"), &WatcherUrl::new(hook.as_str()))
        .unwrap();
    assert_eq!(cursor, Version::new(2));
    let _ = stop_watcher.send(());
}

/// Tests the serve loop starts and stops on the shutdown signal.
#[tokio::test]
async fn serve_stops_on_shutdown_signal() {
    let ledgerline = server("[audit]\nsink = \"noop\"\n[dispatch]\npoll_interval_ms = 10\n");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(ledgerline.serve_with_shutdown(listener, async move {
        let _ = stop_rx.await;
    }));
    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(std::time::Duration::from_secs(10), serving).await.unwrap();
    assert!(result.unwrap().is_ok());
}

/// Tests a SQLite-backed server persists across restarts.
#[tokio::test]
async fn sqlite_backend_persists() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("ledgerline.db");
    let toml = format!(
        "[storage]\nbackend = \"sqlite\"\npath = \"{}\"\n{QUIET_CONFIG}",
        path.display()
    );
    {
        let app = server(&toml).router();
        post_json(&app, "/entity/e1", &json!({"a": 1})).await;
    }
    let app = server(&toml).router();
    let read = send(&app, "GET", "/entity/e1", Body::empty()).await;
    assert_eq!(read.json(), json!({"a": 1}));
}
