use futures::TryStreamExt as _;
use http::StatusCode;
use http_body_util::BodyExt as _;
use hyperdriver::Body;
use tower::ServiceExt as _;
use url::Url;

use storage_driver::{ChunkStream, Driver, StorageError, StorageErrorKind};

const HTTP_STORAGE_NAME: &str = "http";

/// Streams locations served over HTTP or HTTPS with a plain `GET`.
#[derive(Debug, Clone)]
pub struct HttpDriver {
    client: hyperdriver::client::SharedClientService<Body, Body>,
    scheme: &'static str,
}

impl HttpDriver {
    /// Create a driver for `http://` locations.
    pub fn new() -> Self {
        Self::with_client(
            hyperdriver::Client::build_tcp_http()
                .with_default_tls()
                .build_service(),
        )
    }

    /// Create a driver which sends requests through an existing client.
    pub fn with_client(client: hyperdriver::client::SharedClientService<Body, Body>) -> Self {
        Self {
            client,
            scheme: "http",
        }
    }

    /// The same driver, registered for `https://` locations.
    pub fn secure(&self) -> Self {
        Self {
            client: self.client.clone(),
            scheme: "https",
        }
    }
}

impl Default for HttpDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn status_kind(status: StatusCode) -> StorageErrorKind {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => StorageErrorKind::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageErrorKind::PermissionDenied,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            StorageErrorKind::ServiceUnavailable
        }
        status if status.is_server_error() => StorageErrorKind::ServiceUnavailable,
        _ => StorageErrorKind::InvalidRequest,
    }
}

#[async_trait::async_trait]
impl Driver for HttpDriver {
    fn name(&self) -> &'static str {
        HTTP_STORAGE_NAME
    }

    fn scheme(&self) -> &str {
        self.scheme
    }

    async fn read(&self, location: &Url) -> Result<ChunkStream, StorageError> {
        let target = if matches!(location.scheme(), "http" | "https") {
            location.clone()
        } else {
            self.native_location(location)?
        };

        let uri: http::Uri = target.as_str().parse().map_err(|err| {
            StorageError::builder(self.name(), StorageErrorKind::InvalidRequest, err)
                .location(location.as_str())
                .build()
        })?;

        let request = http::Request::builder()
            .method(http::Method::GET)
            .uri(uri)
            .body(Body::empty())
            .map_err(|err| {
                StorageError::builder(self.name(), StorageErrorKind::InvalidRequest, err)
                    .location(location.as_str())
                    .build()
            })?;

        tracing::trace!("GET {}", target);
        let response = self.client.clone().oneshot(request).await.map_err(|err| {
            StorageError::builder(self.name(), StorageErrorKind::ServiceUnavailable, err)
                .location(location.as_str())
                .context("send request")
                .build()
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%location, %status, "location request failed");
            return Err(StorageError::builder(
                self.name(),
                status_kind(status),
                format!("HTTP {status}"),
            )
            .location(location.as_str())
            .build());
        }

        let name = self.name();
        let location = location.to_string();
        let chunks = response
            .into_body()
            .into_data_stream()
            .map_err(move |err| {
                StorageError::builder(name, StorageErrorKind::Io, err)
                    .location(location.clone())
                    .context("read body")
                    .build()
            });

        Ok(Box::pin(chunks))
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use futures::StreamExt as _;

    use super::*;

    async fn serve() -> std::net::SocketAddr {
        let app = axum::Router::new()
            .route("/kernel", get(|| async { "ABCDEF" }))
            .route(
                "/busy",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
            )
            .route("/secret", get(|| async { (StatusCode::FORBIDDEN, "no") }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_kind(StatusCode::GONE), StorageErrorKind::NotFound);
        assert_eq!(
            status_kind(StatusCode::TOO_MANY_REQUESTS),
            StorageErrorKind::ServiceUnavailable
        );
        assert_eq!(
            status_kind(StatusCode::BAD_GATEWAY),
            StorageErrorKind::ServiceUnavailable
        );
        assert_eq!(
            status_kind(StatusCode::BAD_REQUEST),
            StorageErrorKind::InvalidRequest
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn streams_body() {
        let addr = serve().await;
        let location = Url::parse(&format!("http://{addr}/kernel")).unwrap();

        let data: Vec<u8> = HttpDriver::new()
            .open(&location, 6)
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap().to_vec())
            .concat()
            .await;
        assert_eq!(data, b"ABCDEF");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn alias_scheme() {
        let addr = serve().await;
        let location = Url::parse(&format!("images://{addr}/kernel")).unwrap();

        let mut resolver = crate::BackendResolver::new();
        resolver.register("images", HttpDriver::new());

        let data: Vec<u8> = resolver
            .open(&location, 6)
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap().to_vec())
            .concat()
            .await;
        assert_eq!(data, b"ABCDEF");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_statuses() {
        let addr = serve().await;
        let driver = HttpDriver::new();

        let missing = Url::parse(&format!("http://{addr}/missing")).unwrap();
        let err = driver.read(&missing).await.err().unwrap();
        assert_eq!(err.kind(), StorageErrorKind::NotFound);

        let busy = Url::parse(&format!("http://{addr}/busy")).unwrap();
        let err = driver.read(&busy).await.err().unwrap();
        assert!(err.is_retryable());

        let secret = Url::parse(&format!("http://{addr}/secret")).unwrap();
        let err = driver.read(&secret).await.err().unwrap();
        assert_eq!(err.kind(), StorageErrorKind::PermissionDenied);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connection_refused_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let location = Url::parse(&format!("http://{addr}/kernel")).unwrap();
        let err = HttpDriver::new().read(&location).await.err().unwrap();
        assert_eq!(err.kind(), StorageErrorKind::ServiceUnavailable);
    }
}
