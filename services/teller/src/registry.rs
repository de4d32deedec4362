//! Image registries, and selecting one by name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use camino::Utf8Path;

use crate::config::ConfigError;
use crate::descriptor::ImageDescriptor;
use crate::error::{TellerError, TellerResult};

/// Registry used when a request does not name one.
pub const DEFAULT_REGISTRY: &str = "parallax";

/// A source of image metadata.
#[async_trait::async_trait]
pub trait ImageRegistry: fmt::Debug + Send + Sync {
    /// Look up an image by id.
    ///
    /// Returns `TellerError::ImageNotFound` when the registry has no such image.
    async fn image(&self, id: &str) -> TellerResult<ImageDescriptor>;
}

#[async_trait::async_trait]
impl<R> ImageRegistry for Arc<R>
where
    R: ?Sized + ImageRegistry,
{
    async fn image(&self, id: &str) -> TellerResult<ImageDescriptor> {
        (**self).image(id).await
    }
}

/// The configured registries, by name.
#[derive(Debug, Clone)]
pub struct Registries {
    default: String,
    registries: HashMap<String, Arc<dyn ImageRegistry>>,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    /// Create an empty set of registries, defaulting to `parallax`.
    pub fn new() -> Self {
        Self {
            default: DEFAULT_REGISTRY.to_owned(),
            registries: HashMap::new(),
        }
    }

    /// Set the registry used when none is named.
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = name.into();
        self
    }

    /// Add a registry, replacing any registry with the same name.
    pub fn insert<R>(&mut self, name: impl Into<String>, registry: R)
    where
        R: ImageRegistry + 'static,
    {
        self.registries.insert(name.into(), Arc::new(registry));
    }

    /// Add a registry, builder style.
    pub fn with<R>(mut self, name: impl Into<String>, registry: R) -> Self
    where
        R: ImageRegistry + 'static,
    {
        self.insert(name, registry);
        self
    }

    /// Name of the registry used when none is named.
    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Get a registry by name, or the default registry.
    pub fn get(&self, name: Option<&str>) -> TellerResult<&dyn ImageRegistry> {
        let name = name.unwrap_or(&self.default);
        self.registries
            .get(name)
            .map(|registry| registry.as_ref())
            .ok_or_else(|| TellerError::UnknownRegistry(name.to_owned()))
    }

    /// Look up an image in the named registry.
    #[tracing::instrument(skip(self), fields(registry = name.unwrap_or(&self.default)))]
    pub async fn lookup(&self, name: Option<&str>, id: &str) -> TellerResult<ImageDescriptor> {
        let image = self.get(name)?.image(id).await?;
        tracing::debug!(files = image.files.len(), size = ?image.size(), "found image");
        Ok(image)
    }
}

/// A registry holding a fixed set of images.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    images: HashMap<String, ImageDescriptor>,
}

impl StaticRegistry {
    /// Create a registry with no images.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image, replacing any image with the same id.
    pub fn insert(&mut self, image: ImageDescriptor) {
        self.images.insert(image.id.clone(), image);
    }

    /// Add an image, builder style.
    pub fn with_image(mut self, image: ImageDescriptor) -> Self {
        self.insert(image);
        self
    }

    /// Load images from a JSON file holding an array of image descriptors.
    pub async fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?;

        let images: Vec<ImageDescriptor> =
            serde_json::from_str(&text).map_err(|source| ConfigError::Images {
                path: path.to_owned(),
                source,
            })?;

        tracing::debug!(%path, images = images.len(), "loaded static registry");
        Ok(images.into_iter().collect())
    }
}

impl FromIterator<ImageDescriptor> for StaticRegistry {
    fn from_iter<T: IntoIterator<Item = ImageDescriptor>>(iter: T) -> Self {
        let mut registry = Self::new();
        for image in iter {
            registry.insert(image);
        }
        registry
    }
}

#[async_trait::async_trait]
impl ImageRegistry for StaticRegistry {
    async fn image(&self, id: &str) -> TellerResult<ImageDescriptor> {
        self.images
            .get(id)
            .cloned()
            .ok_or_else(|| TellerError::ImageNotFound(id.to_owned()))
    }
}
