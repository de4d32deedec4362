use std::collections::HashMap;

use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::RwLock;
use url::Url;

use storage_driver::{ChunkStream, Driver, StorageError, StorageErrorKind, DEFAULT_CHUNK_SIZE};

/// Storage driver that serves objects held in memory, addressed as
/// `memory://bucket/path/to/object`.
#[derive(Debug)]
pub struct MemoryStorage {
    buckets: RwLock<HashMap<String, HashMap<Utf8PathBuf, Bytes>>>,
    chunk_size: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            buckets: RwLock::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl MemoryStorage {
    /// Create a new `MemoryStorage` instance, with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new `MemoryStorage` instance, with the given buckets.
    pub fn with_buckets(buckets: &[&str]) -> Self {
        let mut map = HashMap::new();
        for bucket in buckets {
            map.insert(bucket.to_string(), HashMap::new());
        }

        Self {
            buckets: RwLock::new(map),
            ..Default::default()
        }
    }

    /// Set the size of the chunks yielded when reading an object.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Add an object while building the storage.
    pub fn with_object(
        mut self,
        bucket: &str,
        remote: impl Into<Utf8PathBuf>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.buckets
            .get_mut()
            .entry(bucket.to_owned())
            .or_default()
            .insert(remote.into(), data.into());
        self
    }

    /// Create a new bucket in the storage.
    pub async fn create_bucket(&self, bucket: String) {
        let mut buckets = self.buckets.write().await;
        buckets.entry(bucket).or_default();
    }

    /// Store an object, replacing any object already at that path.
    pub async fn insert(&self, bucket: &str, remote: impl Into<Utf8PathBuf>, data: impl Into<Bytes>) {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket.to_owned())
            .or_default()
            .insert(remote.into(), data.into());
    }

    async fn get(&self, location: &Url) -> Result<Bytes, StorageError> {
        let not_found = |context: &str| {
            StorageError::builder(
                self.name(),
                StorageErrorKind::NotFound,
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("{context}: {location}")),
            )
            .location(location.as_str())
            .context(context.to_owned())
            .build()
        };

        let bucket = location.host_str().ok_or_else(|| {
            StorageError::builder(
                self.name(),
                StorageErrorKind::InvalidRequest,
                format!("Missing bucket: invalid location {location}"),
            )
            .location(location.as_str())
            .build()
        })?;
        let remote = Utf8Path::new(location.path().trim_start_matches('/'));

        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| not_found("bucket not found"))?;
        objects
            .get(remote)
            .cloned()
            .ok_or_else(|| not_found("path not found"))
    }
}

#[async_trait::async_trait]
impl Driver for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn scheme(&self) -> &str {
        "memory"
    }

    async fn read(&self, location: &Url) -> Result<ChunkStream, StorageError> {
        let data = self.get(location).await?;
        tracing::trace!(%location, size = data.len(), "read memory object");

        let chunk_size = self.chunk_size;
        let chunks = (0..data.len()).step_by(chunk_size).map(move |start| {
            let end = usize::min(start + chunk_size, data.len());
            Ok(data.slice(start..end))
        });

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
