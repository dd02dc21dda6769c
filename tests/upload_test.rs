use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use gridfs_uploader::config::UploaderConfig;
use gridfs_uploader::services::storage::{BlobStore, BlobWriter, MemoryBlobStore};
use gridfs_uploader::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

struct Part<'a> {
    field: &'a str,
    file_name: Option<&'a str>,
    content_type: Option<&'a str>,
    body: &'a [u8],
}

impl<'a> Part<'a> {
    fn file(file_name: &'a str, content_type: &'a str, body: &'a [u8]) -> Self {
        Self {
            field: "files[]",
            file_name: Some(file_name),
            content_type: Some(content_type),
            body,
        }
    }

    fn text(field: &'a str, body: &'a [u8]) -> Self {
        Self {
            field,
            file_name: None,
            content_type: None,
            body,
        }
    }
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.field);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{}\"", file_name));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.body);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>, accept_json: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if accept_json {
        builder = builder.header(header::ACCEPT, "application/json, text/javascript, */*; q=0.01");
    }
    builder.body(Body::from(body)).unwrap()
}

fn app_with(store: Arc<dyn BlobStore>, dir: &Path) -> Router {
    let state = AppState::new(UploaderConfig::development(dir), store);
    create_app(state)
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_upload_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryBlobStore::new();
    let app = app_with(Arc::new(store.clone()), dir.path());

    let body = multipart_body(&[Part::file("a.txt", "text/plain", b"hi")]);
    let response = app.oneshot(upload_request(body, true)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        json_body(response).await,
        json!({"files": [{"name": "a.txt", "type": "text/plain", "size": 2}]})
    );

    assert_eq!(store.get("a.txt").unwrap(), b"hi");
    assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"hi");
}

#[tokio::test]
async fn test_files_reported_in_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryBlobStore::new();
    let app = app_with(Arc::new(store.clone()), dir.path());

    let body = multipart_body(&[
        Part::file("first.txt", "text/plain", b"1"),
        Part::text("comment", b"not a file"),
        Part::file("second.png", "image/png", &[0x89, 0x50, 0x4E, 0x47]),
        Part::file("third.bin", "application/octet-stream", b"three"),
    ]);
    let response = app.oneshot(upload_request(body, true)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let files = json["files"].as_array().unwrap();
    let names: Vec<&str> = files.iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["first.txt", "second.png", "third.bin"]);
    assert_eq!(files[1]["type"], "image/png");
    assert_eq!(files[1]["size"], 4);
    assert_eq!(files[2]["size"], 5);
    assert!(files.iter().all(|f| f.get("error").is_none()));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_large_file_reaches_both_sinks_intact() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryBlobStore::new();
    let app = app_with(Arc::new(store.clone()), dir.path());

    let content: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let body = multipart_body(&[Part::file("big.bin", "application/octet-stream", &content)]);
    let response = app.oneshot(upload_request(body, true)).await.unwrap();

    let json = json_body(response).await;
    assert_eq!(json["files"][0]["size"], content.len() as u64);
    assert_eq!(store.get("big.bin").unwrap(), content);
    assert_eq!(std::fs::read(dir.path().join("big.bin")).unwrap(), content);
}

#[tokio::test]
async fn test_content_type_requires_json_accept() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(Arc::new(MemoryBlobStore::new()), dir.path());

    let body = multipart_body(&[Part::file("a.txt", "text/plain", b"hi")]);
    let response = app.oneshot(upload_request(body, false)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.ends_with(b"\n"));
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["files"][0]["size"], 2);
}

#[tokio::test]
async fn test_same_name_last_writer_wins() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryBlobStore::new();
    let app = app_with(Arc::new(store.clone()), dir.path());

    for content in [&b"old"[..], &b"newer"[..]] {
        let body = multipart_body(&[Part::file("same.txt", "text/plain", content)]);
        let response = app
            .clone()
            .oneshot(upload_request(body, true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(store.get("same.txt").unwrap(), b"newer");
    assert_eq!(std::fs::read(dir.path().join("same.txt")).unwrap(), b"newer");
}

#[tokio::test]
async fn test_invalid_file_name_is_reported_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let upload_dir = dir.path().join("up");
    std::fs::create_dir(&upload_dir).unwrap();
    let store = MemoryBlobStore::new();
    let app = app_with(Arc::new(store.clone()), &upload_dir);

    let body = multipart_body(&[
        Part::file("../escape.txt", "text/plain", b"nope"),
        Part::file("ok.txt", "text/plain", b"fine"),
    ]);
    let response = app.oneshot(upload_request(body, true)).await.unwrap();

    let json = json_body(response).await;
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["size"], 0);
    assert!(
        files[0]["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid file name")
    );
    assert_eq!(files[1]["size"], 4);
    assert!(!dir.path().join("escape.txt").exists());
    assert!(store.get("../escape.txt").is_none());
}

#[tokio::test]
async fn test_truncated_body_stops_processing() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryBlobStore::new();
    let app = app_with(Arc::new(store.clone()), dir.path());

    let mut body = format!(
        "--{b}\r\n\
        Content-Disposition: form-data; name=\"files[]\"; filename=\"whole.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        complete\r\n\
        --{b}\r\n\
        Content-Disposition: form-data; name=\"files[]\"; filename=\"cut.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n",
        b = BOUNDARY
    )
    .into_bytes();
    body.extend_from_slice(b"this part never ends");

    let response = app.oneshot(upload_request(body, true)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["name"], "whole.txt");
    assert_eq!(files[0]["size"], 8);
    assert_eq!(files[1]["name"], "cut.txt");
    assert_eq!(files[1]["size"], 0);
    assert!(
        files[1]["error"]
            .as_str()
            .unwrap()
            .starts_with("upload interrupted")
    );
    assert!(dir.path().join("whole.txt").exists());
    assert!(!dir.path().join("cut.txt").exists());
    assert!(store.get("cut.txt").is_none());
}

#[tokio::test]
async fn test_non_multipart_post_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(Arc::new(MemoryBlobStore::new()), dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("hi"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Blob store whose writers break on the first chunk
struct BrokenBlobStore;

struct BrokenBlobWriter;

#[async_trait]
impl BlobStore for BrokenBlobStore {
    async fn create(&self, _name: &str) -> anyhow::Result<Box<dyn BlobWriter>> {
        Ok(Box::new(BrokenBlobWriter))
    }

    async fn list_names(&self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

#[async_trait]
impl BlobWriter for BrokenBlobWriter {
    async fn write_chunk(&mut self, _chunk: &[u8]) -> anyhow::Result<()> {
        anyhow::bail!("connection reset by peer")
    }

    async fn finish(&mut self) -> anyhow::Result<u64> {
        Ok(0)
    }

    async fn abort(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_blob_failure_is_reported_and_local_copy_survives() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(Arc::new(BrokenBlobStore), dir.path());

    let body = multipart_body(&[Part::file("a.txt", "text/plain", b"hello")]);
    let response = app.oneshot(upload_request(body, true)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let file = &json["files"][0];
    assert_eq!(file["size"], 5);
    assert_eq!(file["error"], "blob store: connection reset by peer");
    assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"hello");
}

#[tokio::test]
async fn test_get_root_serves_upload_page() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(Arc::new(MemoryBlobStore::new()), dir.path());

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("name=\"files[]\""));
}

#[tokio::test]
async fn test_unknown_get_paths_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(Arc::new(MemoryBlobStore::new()), dir.path());

    for uri in ["/unknown", "/index.html", "/a.txt", "/printer/office/file/a.txt"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {}", uri);
    }
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(Arc::new(MemoryBlobStore::new()), dir.path());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().get("x-request-id").is_some());
}
