//! Selects a storage backend from the scheme of a location.

use std::collections::HashMap;

use url::Url;

use storage_driver::{ChunkStream, Driver, StorageError};

use crate::Storage;

/// A table of storage backends keyed by URI scheme.
///
/// Backends are registered at startup. Afterwards the resolver is only read,
/// and is shared between requests behind an `Arc`.
#[derive(Debug, Default, Clone)]
pub struct BackendResolver {
    drivers: HashMap<String, Storage>,
}

impl BackendResolver {
    /// Create a new `BackendResolver` instance, with no drivers.
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Register a driver for all locations with the given scheme, replacing
    /// any driver already registered for it.
    pub fn register<S>(&mut self, scheme: impl Into<String>, driver: S)
    where
        S: Into<Storage>,
    {
        let scheme = scheme.into().to_ascii_lowercase();
        let driver = driver.into();
        tracing::debug!(%scheme, driver = driver.name(), "register storage backend");
        self.drivers.insert(scheme, driver);
    }

    /// Register a driver under its own scheme.
    pub fn add<D>(&mut self, driver: D)
    where
        D: Driver + 'static,
    {
        let scheme = driver.scheme().to_owned();
        self.register(scheme, Storage::new(driver));
    }

    /// Register a driver under its own scheme, builder style.
    pub fn with<D>(mut self, driver: D) -> Self
    where
        D: Driver + 'static,
    {
        self.add(driver);
        self
    }

    /// The schemes which currently have a backend.
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    /// Find the backend responsible for a location.
    pub fn resolve(&self, location: &Url) -> Result<&Storage, StorageError> {
        self.drivers
            .get(location.scheme())
            .ok_or_else(|| StorageError::unsupported_backend(location.as_str(), location.scheme()))
    }

    /// Resolve a location and open it, expecting exactly `expected` bytes.
    pub async fn open(&self, location: &Url, expected: u64) -> Result<ChunkStream, StorageError> {
        self.resolve(location)?.open(location, expected).await
    }
}
