use std::{fmt, ops::Deref, sync::Arc};

use url::{Position, Url};

use crate::chunk::{ChunkStream, SizeChecked};
use crate::error::{StorageError, StorageErrorKind};

/// Default number of bytes requested from a backend per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A storage driver, which provides the ability to read locations from a
/// storage backend as a stream of chunks.
#[async_trait::async_trait]
pub trait Driver: fmt::Debug + Send + Sync {
    /// The name of the driver.
    fn name(&self) -> &'static str;

    /// The URI scheme this driver serves by default.
    fn scheme(&self) -> &str;

    /// Open a location and return its raw chunks, without checking size.
    ///
    /// Resolution of the location (existence, permissions, connectivity)
    /// should happen here, so that callers see those failures before any
    /// chunk is produced.
    async fn read(&self, location: &Url) -> Result<ChunkStream, StorageError>;

    /// Open a location which must contain exactly `expected` bytes.
    ///
    /// Each call reopens the location. The returned stream yields a
    /// `SizeMismatch` error instead of any chunk which would exceed
    /// `expected`, or at the end if fewer bytes were read.
    async fn open(&self, location: &Url, expected: u64) -> Result<ChunkStream, StorageError> {
        tracing::trace!(%location, expected, driver = self.name(), "open");
        let chunks = self.read(location).await?;
        Ok(Box::pin(SizeChecked::new(
            chunks,
            self.name(),
            location.as_str(),
            expected,
        )))
    }

    /// Rewrite `location` onto this driver's own scheme.
    ///
    /// A driver may be registered under any scheme. Locations using such an
    /// alias keep everything after the scheme, so `local:///srv/a` becomes
    /// `file:///srv/a` for a driver whose scheme is `file`.
    fn native_location(&self, location: &Url) -> Result<Url, StorageError> {
        if location.scheme() == self.scheme() {
            return Ok(location.clone());
        }

        let native = format!("{}{}", self.scheme(), &location[Position::AfterScheme..]);
        Url::parse(&native).map_err(|err| {
            StorageError::builder(self.name(), StorageErrorKind::InvalidRequest, err)
                .location(location.as_str())
                .context("rewrite scheme")
                .build()
        })
    }
}

#[async_trait::async_trait]
impl<D> Driver for Arc<D>
where
    D: ?Sized + Driver + 'static,
{
    fn name(&self) -> &'static str {
        self.deref().name()
    }

    fn scheme(&self) -> &str {
        self.deref().scheme()
    }

    async fn read(&self, location: &Url) -> Result<ChunkStream, StorageError> {
        self.deref().read(location).await
    }

    async fn open(&self, location: &Url, expected: u64) -> Result<ChunkStream, StorageError> {
        self.deref().open(location, expected).await
    }

    fn native_location(&self, location: &Url) -> Result<Url, StorageError> {
        self.deref().native_location(location)
    }
}
