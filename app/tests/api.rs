//! HTTP surface tests against the real router.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use file_zipper_lib::{api, config::Config, state::AppState};
use serde_json::{json, Value};
use std::{fs, path::Path};
use tower::ServiceExt;

fn app(start_dir: &Path) -> Router {
    let mut cfg = Config::default();
    cfg.start_dir = start_dir.to_path_buf();
    api::router(AppState::new(cfg), start_dir.join("static"))
}

const LOCAL_HOST: &str = "127.0.0.1:8765";

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, LOCAL_HOST, method, uri, body).await
}

async fn send_as(app: &Router, host: &str, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder().method(method).uri(uri).header("host", host);
    let req = match body {
        Some(b) => req.header("content-type", "application/json").body(Body::from(b.to_string())),
        None    => req.body(Body::empty()),
    }
    .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(&app(dir.path()), "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn open_then_archive_over_http() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.txt"), "hello\nworld\n").unwrap();
    let app = app(dir.path());

    // relative paths resolve against the chooser start dir
    let (status, body) = send(&app, "POST", "/api/open", Some(json!({ "path": "hello.txt" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["document"]["line_count"], 2);

    let (status, body) = send(&app, "GET", "/api/document", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "hello\r\nworld\r\n");

    let (status, body) = send(&app, "POST", "/api/archive", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["entry_name"], "hello.txt");
    assert!(body["report"].as_str().unwrap().contains("Original size: 12 bytes"));
    assert!(dir.path().join("hello.zip").exists());

    let (_, body) = send(&app, "GET", "/api/session", None).await;
    assert_eq!(body["phase"], "archived");
    assert_eq!(body["loading"], false);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = send(&app, "POST", "/api/archive", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "no file has been loaded");

    let (status, _) = send(&app, "GET", "/api/document", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "POST", "/api/open", Some(json!({ "path": "nope.txt" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("nope.txt"));

    let (status, _) = send(&app, "POST", "/api/open", Some(json!({ "path": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // source deleted between open and archive
    let src = dir.path().join("brief.txt");
    fs::write(&src, "brief").unwrap();
    send(&app, "POST", "/api/open", Some(json!({ "path": src }))).await;
    fs::remove_file(&src).unwrap();
    let (status, _) = send(&app, "POST", "/api/archive", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, body) = send(&app, "GET", "/api/session", None).await;
    assert_eq!(body["phase"], "loaded");
}

#[tokio::test]
async fn file_chooser_lists_directories_first() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::write(dir.path().join("b.txt"), "bb").unwrap();
    let app = app(dir.path());

    let (status, body) = send(&app, "GET", "/api/files", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body["entries"].as_array().unwrap().iter().map(|e| e["name"].as_str().unwrap().to_string()).collect();
    assert_eq!(names, ["sub", "a.txt", "b.txt"]);
    assert_eq!(body["entries"][2]["size"], 2);

    let missing = dir.path().join("missing");
    let uri = format!("/api/files?dir={}", missing.display());
    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn index_page_is_served() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("static")).unwrap();
    fs::write(dir.path().join("static/index.html"), "<html>zipper</html>").unwrap();
    let app = app(dir.path());

    let req = Request::builder().uri("/").header("host", "localhost:8765").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<html>zipper</html>");
}

#[tokio::test]
async fn foreign_host_names_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let secret = dir.path().join("secret.txt");
    fs::write(&secret, "s3cret").unwrap();
    let app = app(dir.path());

    for host in ["attacker.example:8765", "127.0.0.1:9999", "localhost"] {
        let (status, body) = send_as(&app, host, "POST", "/api/open", Some(json!({ "path": secret }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "host {host}");
        assert_eq!(body["detail"], "host not allowed");
    }
    let (status, _) = send_as(&app, "attacker.example:8765", "GET", "/api/files", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // nothing was loaded through the refused requests
    let (status, _) = send(&app, "GET", "/api/document", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // loopback aliases are accepted, case-insensitively
    for host in ["LOCALHOST:8765", "[::1]:8765"] {
        let (status, _) = send_as(&app, host, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK, "host {host}");
    }
}

#[tokio::test]
async fn missing_host_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let res = app(dir.path()).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
