//! Chunk sources produced by handlers.

use std::fmt;
use std::io;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};

/// A live, single-use sequence of byte chunks.
///
/// Ends with `None` on exhaustion, or yields an `Err` when the origin fails.
/// Dropping the source releases the underlying connection.
pub struct ChunkSource {
    inner: BoxStream<'static, io::Result<Bytes>>,
}

impl ChunkSource {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// Source backed by an in-memory or otherwise synchronous iterator.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = io::Result<Bytes>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(stream::iter(chunks))
    }

    /// Source streaming the body of an HTTP response.
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(response.bytes_stream().map_err(io::Error::other))
    }

    /// Pull the next chunk, waiting on the origin if needed.
    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        self.inner.next().await
    }
}

impl fmt::Debug for ChunkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkSource").finish_non_exhaustive()
    }
}
