//! Concatenates the files of an image into one stream of chunks.

use std::sync::Arc;

use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt as _};
use storage::{BackendResolver, ChunkStream, RetryPolicy, StorageError};

use crate::descriptor::ImageDescriptor;

/// Streams an image's files, in order, from their storage backends.
///
/// Each file is opened only after the previous file has been read to the
/// end, so at most one backend handle is open at a time. Opening a file is
/// retried according to the retry policy. Failures after a file has started
/// producing data are never retried.
#[derive(Debug, Clone)]
pub struct ImageAssembler {
    backends: Arc<BackendResolver>,
    retry: RetryPolicy,
}

impl ImageAssembler {
    /// Create an assembler reading from `backends`, with the default retry policy.
    pub fn new(backends: Arc<BackendResolver>) -> Self {
        Self {
            backends,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy used when opening files.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The backends files are read from.
    pub fn backends(&self) -> &BackendResolver {
        &self.backends
    }

    /// Stream the bytes of `image`.
    ///
    /// Nothing is opened until the stream is polled. The first error ends the
    /// stream, after any chunks which were already produced.
    pub fn stream(&self, image: ImageDescriptor) -> ChunkStream {
        Box::pin(assemble(self.backends.clone(), self.retry.clone(), image))
    }
}

fn assemble(
    backends: Arc<BackendResolver>,
    retry: RetryPolicy,
    image: ImageDescriptor,
) -> impl Stream<Item = Result<Bytes, StorageError>> + Send + 'static {
    try_stream! {
        let count = image.files.len();
        for (index, file) in image.files.into_iter().enumerate() {
            tracing::trace!(image = %image.id, index, count, location = %file.location, size = file.size, "open file");
            let mut chunks = retry
                .run(|| backends.open(&file.location, file.size))
                .await?;

            while let Some(chunk) = chunks.next().await {
                yield chunk?;
            }
        }
        tracing::debug!(image = %image.id, files = count, "image complete");
    }
}
