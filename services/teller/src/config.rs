//! Service configuration, read from TOML.
//!
//! ```toml
//! bind = "0.0.0.0:9292"
//! default-registry = "parallax"
//! content-type = "application/octet-stream"
//!
//! [retry]
//! attempts = 3
//! delay-ms = 100
//!
//! [[backends]]
//! kind = "file"
//!
//! [registries.parallax]
//! kind = "parallax"
//! url = "http://127.0.0.1:9191/"
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use storage::{Backoff, BackendResolver, RetryPolicy, StorageConfig, StorageError};
use url::Url;

use crate::api::{DEFAULT_CONTENT_TYPE, TellerBuilder};
use crate::parallax::ParallaxRegistry;
use crate::registry::{DEFAULT_REGISTRY, Registries, StaticRegistry};

/// Errors reading or applying configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A file could not be read
    #[error("reading {path}: {source}")]
    Read {
        /// The file
        path: Utf8PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML, or has the wrong shape
    #[error("parsing configuration: {0}")]
    Parse(#[from] toml_edit::de::Error),

    /// A static registry file does not hold image descriptors
    #[error("parsing images in {path}: {source}")]
    Images {
        /// The file
        path: Utf8PathBuf,
        /// Underlying failure
        #[source]
        source: serde_json::Error,
    },

    /// The content type is not a valid header value
    #[error("invalid content type {0:?}")]
    ContentType(String),

    /// A registry URL is not an http(s) base URL
    #[error("invalid registry url {0}")]
    RegistryUrl(Url),

    /// A storage backend could not be set up
    #[error("storage backend: {0}")]
    Storage(#[from] StorageError),
}

/// Retry policy for opening image files
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the first retry
    pub delay_ms: u64,
    /// Factor applied to the delay after each retry
    pub exponent: u32,
    /// Upper bound on the delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 100,
            exponent: 2,
            max_delay_ms: 2000,
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        RetryPolicy::new(
            config.attempts,
            Backoff::new(
                Duration::from_millis(config.delay_ms),
                config.exponent,
                Duration::from_millis(config.max_delay_ms),
            ),
        )
    }
}

/// A named image registry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RegistryConfig {
    /// Images listed in a JSON file
    Static {
        /// Path to a JSON array of image descriptors
        path: Utf8PathBuf,
    },

    /// A parallax-style metadata service
    Parallax {
        /// Base URL of the service
        url: Url,
    },
}

/// Configuration for the image service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TellerConfig {
    /// Address to listen on
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Registry used when a request does not name one
    #[serde(default = "default_registry")]
    pub default_registry: String,

    /// Content type of image responses
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Retry policy for opening image files
    #[serde(default)]
    pub retry: RetryConfig,

    /// Storage backends, by kind
    #[serde(default = "default_backends")]
    pub backends: Vec<StorageConfig>,

    /// Image registries, by name
    #[serde(default)]
    pub registries: BTreeMap<String, RegistryConfig>,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9292))
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_owned()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_owned()
}

fn default_backends() -> Vec<StorageConfig> {
    vec![StorageConfig::File { chunk_size: None }, StorageConfig::Http]
}

impl Default for TellerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            default_registry: default_registry(),
            content_type: default_content_type(),
            retry: RetryConfig::default(),
            backends: default_backends(),
            registries: BTreeMap::new(),
        }
    }
}

impl TellerConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml_edit::de::from_str(text)?)
    }

    /// Read configuration from a TOML file
    pub async fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?;
        Self::from_toml(&text)
    }

    /// Set up registries and storage backends, and return a builder for the service
    #[tracing::instrument(skip(self))]
    pub async fn builder(self) -> Result<TellerBuilder, ConfigError> {
        let content_type = HeaderValue::from_str(&self.content_type)
            .map_err(|_| ConfigError::ContentType(self.content_type.clone()))?;

        let mut backends = BackendResolver::new();
        for backend in self.backends {
            backend.register(&mut backends)?;
        }

        let mut registries = Registries::new().with_default(self.default_registry);
        for (name, registry) in self.registries {
            match registry {
                RegistryConfig::Static { path } => {
                    let registry = StaticRegistry::from_file(&path).await?;
                    registries.insert(name, registry);
                }
                RegistryConfig::Parallax { url } => {
                    let registry = ParallaxRegistry::new(name.clone(), url)?;
                    registries.insert(name, registry);
                }
            }
        }

        if registries.get(None).is_err() {
            tracing::warn!(
                registry = registries.default_name(),
                "default registry is not configured"
            );
        }

        Ok(TellerBuilder::new()
            .registries(registries)
            .backends(backends)
            .retry(self.retry.into())
            .content_type(content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TellerConfig::from_toml("").unwrap();
        assert_eq!(config.bind, default_bind());
        assert_eq!(config.default_registry, "parallax");
        assert_eq!(config.content_type, "text/plain");
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.backends.len(), 2);
    }

    #[test]
    fn full_config() {
        let config = TellerConfig::from_toml(
            r#"
            bind = "0.0.0.0:8080"
            default-registry = "local"
            content-type = "application/octet-stream"

            [retry]
            attempts = 5
            delay-ms = 10

            [[backends]]
            kind = "memory"
            bucket = "images"
            chunk-size = 2

            [backends.objects]
            kernel = "ABCD"

            [registries.local]
            kind = "static"
            path = "/etc/teller/images.json"

            [registries.remote]
            kind = "parallax"
            url = "http://127.0.0.1:9191/"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.default_registry, "local");
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.delay_ms, 10);
        assert_eq!(config.retry.exponent, 2);
        assert_eq!(config.backends.len(), 1);
        assert!(matches!(
            config.registries.get("local"),
            Some(RegistryConfig::Static { path }) if path == "/etc/teller/images.json"
        ));
        assert!(matches!(
            config.registries.get("remote"),
            Some(RegistryConfig::Parallax { .. })
        ));
    }

    #[test]
    fn unknown_backend_kind() {
        let err = TellerConfig::from_toml(
            r#"
            [[backends]]
            kind = "s3"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn build_from_config() {
        let config = TellerConfig {
            content_type: "application/octet-stream".into(),
            ..Default::default()
        };
        let state = config.builder().await.unwrap().state();
        assert_eq!(state.content_type(), "application/octet-stream");
        assert_eq!(state.assembler().backends().schemes().count(), 3);
    }

    #[tokio::test]
    async fn bad_content_type() {
        let config = TellerConfig {
            content_type: "text/plain\n".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.builder().await,
            Err(ConfigError::ContentType(_))
        ));
    }
}
