//! Client for a parallax-style image metadata service.
//!
//! The service answers `GET {base}/images/{id}` with `{"image": {...}}`.

use http::StatusCode;
use http_body_util::BodyExt as _;
use hyperdriver::Body;
use serde::Deserialize;
use tower::ServiceExt as _;
use url::Url;

use crate::config::ConfigError;
use crate::descriptor::ImageDescriptor;
use crate::error::{TellerError, TellerResult};
use crate::registry::ImageRegistry;

#[derive(Debug, Deserialize)]
struct ImageEnvelope {
    image: ImageDescriptor,
}

/// Looks images up in a remote metadata service over HTTP.
#[derive(Debug, Clone)]
pub struct ParallaxRegistry {
    name: String,
    base: Url,
    client: hyperdriver::client::SharedClientService<Body, Body>,
}

impl ParallaxRegistry {
    /// Create a client for the service rooted at `base`.
    pub fn new(name: impl Into<String>, base: Url) -> Result<Self, ConfigError> {
        Self::with_client(
            name,
            base,
            hyperdriver::Client::build_tcp_http()
                .with_default_tls()
                .build_service(),
        )
    }

    /// Create a client which sends requests through an existing client.
    pub fn with_client(
        name: impl Into<String>,
        base: Url,
        client: hyperdriver::client::SharedClientService<Body, Body>,
    ) -> Result<Self, ConfigError> {
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ConfigError::RegistryUrl(base));
        }

        Ok(Self {
            name: name.into(),
            base,
            client,
        })
    }

    /// The URL of the metadata for one image.
    fn image_url(&self, id: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("images").push(id);
        }
        url
    }

    fn unavailable(&self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> TellerError {
        TellerError::RegistryUnavailable {
            registry: self.name.clone(),
            source: source.into(),
        }
    }
}

#[async_trait::async_trait]
impl ImageRegistry for ParallaxRegistry {
    #[tracing::instrument(skip(self), fields(registry = %self.name))]
    async fn image(&self, id: &str) -> TellerResult<ImageDescriptor> {
        // Dot segments would be resolved away instead of naming an image.
        if matches!(id, "." | "..") {
            return Err(TellerError::ImageNotFound(id.to_owned()));
        }

        let url = self.image_url(id);
        tracing::trace!("GET {}", url);

        let request = http::Request::builder()
            .method(http::Method::GET)
            .uri(url.as_str())
            .header(http::header::ACCEPT, "application/json")
            .body(Body::empty())
            .map_err(|err| self.unavailable(err))?;

        let response = self
            .client
            .clone()
            .oneshot(request)
            .await
            .map_err(|err| self.unavailable(err))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(TellerError::ImageNotFound(id.to_owned())),
            status => return Err(self.unavailable(format!("HTTP {status} from {url}"))),
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|err| self.unavailable(err))?
            .to_bytes();

        let envelope: ImageEnvelope =
            serde_json::from_slice(&body).map_err(|err| TellerError::InvalidMetadata {
                registry: self.name.clone(),
                source: err.into(),
            })?;

        Ok(envelope.image)
    }
}

#[cfg(test)]
mod tests {
    use axum::Json;
    use axum::extract::Path;
    use axum::routing::get;

    use super::*;

    async fn serve() -> Url {
        let app = axum::Router::new()
            .route(
                "/api/images",
                get(|| async { Json(serde_json::json!({"images": []})) }),
            )
            .route(
                "/api/images/{id}",
                get(|Path(id): Path<String>| async move {
                    match id.as_str() {
                        "1" => Ok(Json(serde_json::json!({
                            "image": {
                                "id": 1,
                                "files": [{"location": "memory://images/a", "size": 4}]
                            }
                        }))),
                        "broken" => Ok(Json(serde_json::json!({"images": []}))),
                        "busy" => Err(StatusCode::SERVICE_UNAVAILABLE),
                        _ => Err(StatusCode::NOT_FOUND),
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/api/")).unwrap()
    }

    #[test]
    fn image_urls() {
        let registry =
            ParallaxRegistry::new("parallax", Url::parse("http://localhost:9292").unwrap())
                .unwrap();
        assert_eq!(
            registry.image_url("42").as_str(),
            "http://localhost:9292/images/42"
        );

        let registry =
            ParallaxRegistry::new("parallax", Url::parse("http://localhost/v1/").unwrap()).unwrap();
        assert_eq!(
            registry.image_url("a b").as_str(),
            "http://localhost/v1/images/a%20b"
        );
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(
            ParallaxRegistry::new("parallax", Url::parse("file:///tmp").unwrap()).is_err()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lookups() {
        let registry = ParallaxRegistry::new("parallax", serve().await).unwrap();

        let image = registry.image("1").await.unwrap();
        assert_eq!(image.id, "1");
        assert_eq!(image.size(), Some(4));

        assert!(matches!(
            registry.image("2").await,
            Err(TellerError::ImageNotFound(_))
        ));
        assert!(matches!(
            registry.image("busy").await,
            Err(TellerError::RegistryUnavailable { .. })
        ));
        assert!(matches!(
            registry.image("broken").await,
            Err(TellerError::InvalidMetadata { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dot_segment_ids() {
        let registry = ParallaxRegistry::new("parallax", serve().await).unwrap();

        for id in [".", ".."] {
            assert!(
                matches!(registry.image(id).await, Err(TellerError::ImageNotFound(_))),
                "{id}"
            );
        }
    }
}
