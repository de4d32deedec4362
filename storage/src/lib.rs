//! # Storage backends
//!
//! Configuration and unification for the storage backends which hold image
//! files, and the scheme table used to pick one for a location.

use std::collections::BTreeMap;
use std::sync::Arc;

use camino::Utf8PathBuf;
use serde::Deserialize;
use url::Url;

#[cfg(feature = "file")]
pub(crate) mod file;
#[cfg(feature = "http")]
pub(crate) mod web;
pub(crate) mod memory;
pub mod resolver;
pub mod retry;

#[cfg(feature = "file")]
#[doc(inline)]
pub use file::FileDriver;

#[cfg(feature = "http")]
#[doc(inline)]
pub use web::HttpDriver;

#[doc(inline)]
pub use memory::MemoryStorage;

#[doc(inline)]
pub use resolver::BackendResolver;

#[doc(inline)]
pub use retry::{Backoff, RetryPolicy};

#[doc(inline)]
pub use storage_driver::{
    ChunkStream, Driver, SizeChecked, StorageError, StorageErrorKind, DEFAULT_CHUNK_SIZE,
};

/// Configuration for one storage backend, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StorageConfig {
    /// Objects held in process memory, read as `memory://bucket/path`.
    #[serde(rename_all = "kebab-case")]
    Memory {
        /// Bucket to create, and to hold `objects`.
        bucket: String,

        /// Initial objects, by path within the bucket.
        #[serde(default)]
        objects: BTreeMap<Utf8PathBuf, String>,

        /// Bytes per chunk.
        chunk_size: Option<usize>,
    },

    /// The local filesystem, read as `file:///path`.
    #[cfg(feature = "file")]
    #[serde(rename_all = "kebab-case")]
    File {
        /// Bytes per chunk.
        chunk_size: Option<usize>,
    },

    /// Plain `GET` requests for `http://` and `https://` locations.
    #[cfg(feature = "http")]
    Http,
}

impl StorageConfig {
    /// Build this backend and register it with `resolver` under the schemes
    /// it serves.
    #[tracing::instrument(skip(resolver))]
    pub fn register(self, resolver: &mut BackendResolver) -> Result<(), StorageError> {
        match self {
            StorageConfig::Memory {
                bucket,
                objects,
                chunk_size,
            } => {
                let mut storage = MemoryStorage::with_buckets(&[&bucket]);
                if let Some(chunk_size) = positive(chunk_size)? {
                    storage = storage.with_chunk_size(chunk_size);
                }
                for (path, data) in objects {
                    storage = storage.with_object(&bucket, path, data);
                }
                resolver.add(storage);
            }
            #[cfg(feature = "file")]
            StorageConfig::File { chunk_size } => {
                let mut driver = FileDriver::new();
                if let Some(chunk_size) = positive(chunk_size)? {
                    driver = driver.with_chunk_size(chunk_size);
                }
                resolver.add(driver);
            }
            #[cfg(feature = "http")]
            StorageConfig::Http => {
                let driver = HttpDriver::new();
                resolver.add(driver.secure());
                resolver.add(driver);
            }
        }
        Ok(())
    }
}

fn positive(chunk_size: Option<usize>) -> Result<Option<usize>, StorageError> {
    match chunk_size {
        Some(0) => Err(StorageError::new(
            "config",
            StorageErrorKind::InvalidRequest,
            "chunk-size must be greater than zero",
        )),
        other => Ok(other),
    }
}

pub(crate) type ArcDriver = Arc<dyn Driver>;

/// A shared handle to a storage driver.
#[derive(Debug, Clone)]
pub struct Storage {
    driver: ArcDriver,
}

impl<D> From<D> for Storage
where
    D: Driver + 'static,
{
    fn from(value: D) -> Self {
        Storage::new(value)
    }
}

impl Storage {
    /// Wrap a driver so that it can be shared.
    pub fn new<D: Driver + 'static>(driver: D) -> Self {
        Self {
            driver: Arc::new(driver),
        }
    }

    /// The name of the underlying driver.
    pub fn name(&self) -> &'static str {
        self.driver.name()
    }

    /// The scheme the underlying driver serves by default.
    pub fn scheme(&self) -> &str {
        self.driver.scheme()
    }

    /// Open a location, which must hold exactly `expected` bytes.
    #[tracing::instrument(skip(self), fields(driver=self.driver.name(), %location))]
    pub async fn open(&self, location: &Url, expected: u64) -> Result<ChunkStream, StorageError> {
        self.driver.open(location, expected).await
    }

    /// Open a location without checking its size.
    #[tracing::instrument(skip(self), fields(driver=self.driver.name(), %location))]
    pub async fn read(&self, location: &Url) -> Result<ChunkStream, StorageError> {
        self.driver.read(location).await
    }
}
