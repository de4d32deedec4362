//! Chunked reads and the size check applied to every opened location.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::FusedStream;
use futures::{ready, Stream};
use pin_project::pin_project;

use crate::StorageError;

/// A lazy, single-pass sequence of byte chunks read from one location.
///
/// Dropping the stream releases whatever backend handle it holds.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send + 'static>>;

/// Counts bytes as they pass through, and fails the stream when the total
/// disagrees with the expected size.
///
/// A chunk that would overflow the expected size is never forwarded. Once the
/// stream yields an error or ends, the inner stream is dropped immediately.
#[pin_project]
#[derive(Debug)]
pub struct SizeChecked<S> {
    #[pin]
    inner: Option<S>,
    engine: &'static str,
    location: String,
    expected: u64,
    seen: u64,
}

impl<S> SizeChecked<S> {
    /// Wrap `inner`, which reads `location`, expecting exactly `expected` bytes.
    pub fn new(
        inner: S,
        engine: &'static str,
        location: impl Into<String>,
        expected: u64,
    ) -> Self {
        Self {
            inner: Some(inner),
            engine,
            location: location.into(),
            expected,
            seen: 0,
        }
    }

    /// Bytes forwarded so far.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Bytes this stream must produce in total.
    pub fn expected(&self) -> u64 {
        self.expected
    }
}

impl<S> Stream for SizeChecked<S>
where
    S: Stream<Item = Result<Bytes, StorageError>>,
{
    type Item = Result<Bytes, StorageError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let Some(inner) = this.inner.as_mut().as_pin_mut() else {
                return Poll::Ready(None);
            };

            match ready!(inner.poll_next(cx)) {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => {
                    let total = *this.seen + chunk.len() as u64;
                    if total > *this.expected {
                        this.inner.set(None);
                        tracing::error!(
                            location = %this.location,
                            expected = *this.expected,
                            read = total,
                            "location is larger than expected"
                        );
                        return Poll::Ready(Some(Err(StorageError::size_mismatch(
                            *this.engine,
                            this.location.clone(),
                            *this.expected,
                            total,
                        ))));
                    }
                    *this.seen = total;
                    return Poll::Ready(Some(Ok(chunk)));
                }
                Some(Err(error)) => {
                    this.inner.set(None);
                    return Poll::Ready(Some(Err(error)));
                }
                None => {
                    this.inner.set(None);
                    if *this.seen < *this.expected {
                        tracing::error!(
                            location = %this.location,
                            expected = *this.expected,
                            read = *this.seen,
                            "location is shorter than expected"
                        );
                        return Poll::Ready(Some(Err(StorageError::size_mismatch(
                            *this.engine,
                            this.location.clone(),
                            *this.expected,
                            *this.seen,
                        ))));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl<S> FusedStream for SizeChecked<S>
where
    S: Stream<Item = Result<Bytes, StorageError>>,
{
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}
