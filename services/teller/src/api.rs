//! API server builder and router

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use storage::{BackendResolver, RetryPolicy};
use tower_http::trace::TraceLayer;

use crate::assembler::ImageAssembler;
use crate::registry::Registries;

/// Content type sent with image data unless configured otherwise.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Shared, read-only state of the image service.
#[derive(Debug, Clone)]
pub struct TellerState {
    registries: Arc<Registries>,
    assembler: ImageAssembler,
    content_type: HeaderValue,
}

impl TellerState {
    /// The configured registries
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// The assembler for image data
    pub fn assembler(&self) -> &ImageAssembler {
        &self.assembler
    }

    /// Content type of image responses
    pub fn content_type(&self) -> &HeaderValue {
        &self.content_type
    }
}

/// Builder for configuring and creating the image service
#[derive(Debug)]
pub struct TellerBuilder {
    registries: Registries,
    backends: BackendResolver,
    retry: RetryPolicy,
    content_type: HeaderValue,
}

impl Default for TellerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TellerBuilder {
    /// Create a new builder, with no registries or storage backends
    pub fn new() -> Self {
        Self {
            registries: Registries::new(),
            backends: BackendResolver::new(),
            retry: RetryPolicy::default(),
            content_type: HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
        }
    }

    /// Set the registries images are looked up in
    pub fn registries(mut self, registries: Registries) -> Self {
        self.registries = registries;
        self
    }

    /// Set the storage backends image files are read from
    pub fn backends(mut self, backends: BackendResolver) -> Self {
        self.backends = backends;
        self
    }

    /// Set the retry policy for opening image files
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the content type of image responses
    pub fn content_type(mut self, content_type: HeaderValue) -> Self {
        self.content_type = content_type;
        self
    }

    /// Build the shared state, without a router
    pub fn state(self) -> TellerState {
        TellerState {
            registries: Arc::new(self.registries),
            assembler: ImageAssembler::new(Arc::new(self.backends)).with_retry(self.retry),
            content_type: self.content_type,
        }
    }

    /// Build the image service
    ///
    /// Returns a Router that can be served with any tower-compatible server
    pub fn build(self) -> Router {
        Router::new()
            .merge(crate::image::router())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state())
    }
}
