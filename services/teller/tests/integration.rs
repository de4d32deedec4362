//! Integration tests for the image service

use std::io::Write as _;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode, header};
use http_body_util::BodyExt as _;
use storage::{
    Backoff, BackendResolver, ChunkStream, Driver, FileDriver, MemoryStorage, RetryPolicy,
    StorageError, StorageErrorKind,
};
use teller::{
    FileDescriptor, ImageDescriptor, Registries, StaticRegistry, TellerBuilder, TellerConfig,
};
use tower::ServiceExt;
use url::Url;

fn file(location: &str, size: u64) -> FileDescriptor {
    FileDescriptor::new(Url::parse(location).unwrap(), size)
}

fn memory() -> MemoryStorage {
    MemoryStorage::new()
        .with_object("images", "a", "ABCD")
        .with_object("images", "b", "EF")
}

/// Helper to create a test service over in-memory storage
fn test_teller() -> axum::Router {
    let images = StaticRegistry::new()
        .with_image(ImageDescriptor::new(
            "1",
            vec![file("memory://images/a", 4), file("memory://images/b", 2)],
        ))
        .with_image(ImageDescriptor::new("empty", vec![]))
        .with_image(ImageDescriptor::new(
            "missing-first",
            vec![file("memory://images/nope", 4), file("memory://images/b", 2)],
        ))
        .with_image(ImageDescriptor::new(
            "missing-second",
            vec![file("memory://images/a", 4), file("memory://images/nope", 2)],
        ))
        .with_image(ImageDescriptor::new(
            "wrong-size",
            vec![file("memory://images/a", 3)],
        ))
        .with_image(ImageDescriptor::new(
            "unsupported",
            vec![file("s3://images/a", 4)],
        ))
        .with_image(ImageDescriptor::new(
            "oversized",
            vec![file("memory://images/a", u64::MAX), file("memory://images/b", 2)],
        ));

    let other = StaticRegistry::new().with_image(ImageDescriptor::new(
        "2",
        vec![file("memory://images/b", 2)],
    ));

    TellerBuilder::new()
        .backends(BackendResolver::new().with(memory()))
        .registries(
            Registries::new()
                .with("parallax", images)
                .with("other", other),
        )
        .build()
}

async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_stream_image() {
    let app = test_teller();

    let response = get(&app, "/images/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "6");
    assert_eq!(text(response).await, "ABCDEF");
}

#[tokio::test]
async fn test_named_registry() {
    let app = test_teller();

    let response = get(&app, "/images/2?registry=other").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "EF");

    let response = get(&app, "/images/2").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_image() {
    let app = test_teller();

    let response = get(&app, "/images/empty").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
    assert_eq!(text(response).await, "");
}

#[tokio::test]
async fn test_unknown_registry() {
    let app = test_teller();

    let response = get(&app, "/images/1?registry=bogus").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Unknown registry 'bogus'");
}

#[tokio::test]
async fn test_image_not_found() {
    let app = test_teller();

    let response = get(&app, "/images/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(response).await, "Image not found");
}

#[tokio::test]
async fn test_not_implemented() {
    let app = test_teller();

    for _ in 0..2 {
        for (method, uri) in [
            ("GET", "/images"),
            ("POST", "/images"),
            ("PUT", "/images/1"),
            ("DELETE", "/images/1"),
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::from("{\"image\": {}}"))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED, "{method} {uri}");
            assert_eq!(text(response).await, "Not Implemented");
        }
    }

    // Stubs have no side effects.
    let response = get(&app, "/images/1").await;
    assert_eq!(text(response).await, "ABCDEF");
}

#[tokio::test]
async fn test_first_file_missing() {
    let app = test_teller();

    let response = get(&app, "/images/missing-first").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_first_file_wrong_size() {
    let app = test_teller();

    let response = get(&app, "/images/wrong-size").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unsupported_backend() {
    let app = test_teller();

    let response = get(&app, "/images/unsupported").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(response).await, "Internal Server Error");
}

#[tokio::test]
async fn test_image_size_overflow() {
    let app = test_teller();

    let response = get(&app, "/images/oversized").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(text(response).await, "Bad Gateway");
}

#[tokio::test]
async fn test_second_file_missing() {
    let app = test_teller();

    let response = get(&app, "/images/missing-second").await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    assert_eq!(frame.into_data().unwrap(), "ABCD");

    let error = body.frame().await.unwrap();
    assert!(error.is_err());
}

#[tokio::test]
async fn test_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    std::fs::File::create(&a).unwrap().write_all(b"ABCD").unwrap();
    std::fs::File::create(&b).unwrap().write_all(b"EF").unwrap();

    let image = ImageDescriptor::new(
        "1",
        vec![
            FileDescriptor::new(Url::from_file_path(&a).unwrap(), 4),
            FileDescriptor::new(Url::from_file_path(&b).unwrap(), 2),
        ],
    );

    let app = TellerBuilder::new()
        .backends(BackendResolver::new().with(FileDriver::new().with_chunk_size(3)))
        .registries(Registries::new().with("parallax", StaticRegistry::new().with_image(image)))
        .content_type(HeaderValue::from_static("application/octet-stream"))
        .build();

    let response = get(&app, "/images/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(text(response).await, "ABCDEF");
}

#[derive(Debug)]
struct Unavailable;

#[async_trait::async_trait]
impl Driver for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn scheme(&self) -> &str {
        "down"
    }

    async fn read(&self, _location: &Url) -> Result<ChunkStream, StorageError> {
        Err(StorageError::new(
            self.name(),
            StorageErrorKind::ServiceUnavailable,
            "backend is down",
        ))
    }
}

#[tokio::test]
async fn test_backend_unavailable() {
    let image = ImageDescriptor::new("1", vec![file("down://images/a", 4)]);
    let app = TellerBuilder::new()
        .backends(BackendResolver::new().with(Unavailable))
        .registries(Registries::new().with("parallax", StaticRegistry::new().with_image(image)))
        .retry(RetryPolicy::new(
            2,
            Backoff::new(Duration::from_millis(1), 2, Duration::from_millis(2)),
        ))
        .build();

    let response = get(&app, "/images/1").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(text(response).await, "Service Unavailable");
}

#[tokio::test]
async fn test_from_config() {
    let mut images = tempfile::NamedTempFile::new().unwrap();
    write!(
        images,
        r#"[{{"id": 3, "files": [{{"location": "memory://images/kernel", "size": 4}}]}}]"#
    )
    .unwrap();

    let config = TellerConfig::from_toml(&format!(
        r#"
        default-registry = "local"

        [retry]
        attempts = 1

        [[backends]]
        kind = "memory"
        bucket = "images"
        chunk-size = 1

        [backends.objects]
        kernel = "WXYZ"

        [registries.local]
        kind = "static"
        path = "{}"
        "#,
        images.path().display()
    ))
    .unwrap();

    let app = config.builder().await.unwrap().build();

    let response = get(&app, "/images/3").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "WXYZ");
}
