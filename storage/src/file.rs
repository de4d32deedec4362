use eyre::eyre;
use futures::TryStreamExt as _;
use tokio_util::io::ReaderStream;
use url::Url;

use storage_driver::{ChunkStream, Driver, StorageError, StorageErrorKind, DEFAULT_CHUNK_SIZE};

const FILE_STORAGE_NAME: &str = "file";

/// Reads `file:///absolute/path` locations from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileDriver {
    chunk_size: usize,
}

impl Default for FileDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDriver {
    /// Create a file driver which reads in chunks of `DEFAULT_CHUNK_SIZE`.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the number of bytes read per chunk.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn path(&self, location: &Url) -> Result<std::path::PathBuf, StorageError> {
        match location.host_str() {
            None | Some("") | Some("localhost") => {}
            Some(host) => {
                return Err(StorageError::builder(
                    self.name(),
                    StorageErrorKind::InvalidRequest,
                    eyre!("file locations must be local, got host {host}"),
                )
                .location(location.as_str())
                .build())
            }
        }

        location.to_file_path().map_err(|_| {
            StorageError::builder(
                self.name(),
                StorageErrorKind::InvalidRequest,
                eyre!("not a local file path: {location}"),
            )
            .location(location.as_str())
            .build()
        })
    }
}

#[async_trait::async_trait]
impl Driver for FileDriver {
    fn name(&self) -> &'static str {
        FILE_STORAGE_NAME
    }

    fn scheme(&self) -> &str {
        "file"
    }

    async fn read(&self, location: &Url) -> Result<ChunkStream, StorageError> {
        let path = self.path(&self.native_location(location)?)?;
        tracing::trace!(path = %path.display(), "open local file");

        let file = tokio::fs::File::open(&path).await.map_err(|err| {
            StorageError::from_io(self.name(), err)
                .location(location.as_str())
                .context("open file")
                .build()
        })?;

        let name = self.name();
        let location = location.to_string();
        let chunks = ReaderStream::with_capacity(file, self.chunk_size).map_err(move |err| {
            StorageError::from_io(name, err)
                .location(location.clone())
                .context("read file")
                .build()
        });

        Ok(Box::pin(chunks))
    }
}
