//! Pull-based reader over a [`ChunkSource`].
//!
//! Upstream chunks arrive in whatever sizes the origin chooses. The reader
//! hands out at most `max_bytes` per call and carries the remainder of an
//! oversized chunk over to the next call. End of stream is an empty read;
//! an origin failure is a [`StreamError::Read`], never a short read.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use super::source::ChunkSource;
use super::StreamError;

#[derive(Debug)]
pub struct ChunkReader {
    source: Option<ChunkSource>,
    leftover: Bytes,
    failure: Option<Arc<io::Error>>,
    timeout: Option<Duration>,
    closed: bool,
}

impl ChunkReader {
    pub fn new(source: ChunkSource) -> Self {
        Self {
            source: Some(source),
            leftover: Bytes::new(),
            failure: None,
            timeout: None,
            closed: false,
        }
    }

    /// Bound how long a read waits for the next upstream chunk. A read
    /// that runs out of time returns [`StreamError::Timeout`] and can be
    /// retried; `None` waits forever.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read up to `max_bytes`.
    ///
    /// Returns leftover bytes first, otherwise waits for the next upstream
    /// chunk. An empty result means the source is exhausted (or
    /// `max_bytes` was 0). Once the source has failed, every call returns
    /// the same error. After [`close`](Self::close) reads fail with
    /// [`StreamError::Closed`].
    pub async fn read(&mut self, max_bytes: usize) -> Result<Bytes, StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        if max_bytes == 0 {
            return Ok(Bytes::new());
        }
        if !self.leftover.is_empty() {
            return Ok(self.take_leftover(max_bytes));
        }
        if let Some(err) = &self.failure {
            return Err(StreamError::Read(Arc::clone(err)));
        }

        let Some(source) = self.source.as_mut() else {
            return Ok(Bytes::new());
        };

        loop {
            let next = match self.timeout {
                // Polling the source is cancel-safe, so a timed-out wait loses nothing.
                Some(limit) => tokio::time::timeout(limit, source.next_chunk())
                    .await
                    .map_err(|_| StreamError::Timeout(limit))?,
                None => source.next_chunk().await,
            };
            match next {
                Some(Ok(chunk)) if chunk.is_empty() => {}
                Some(Ok(chunk)) => {
                    self.leftover = chunk;
                    return Ok(self.take_leftover(max_bytes));
                }
                Some(Err(err)) => {
                    debug!("chunk source failed: {err}");
                    let err = Arc::new(err);
                    self.failure = Some(Arc::clone(&err));
                    self.source = None;
                    return Err(StreamError::Read(err));
                }
                None => {
                    self.source = None;
                    return Ok(Bytes::new());
                }
            }
        }
    }

    /// True once the source has ended or failed and no bytes remain.
    pub fn is_finished(&self) -> bool {
        self.source.is_none() && self.leftover.is_empty()
    }

    /// Release the underlying source. Idempotent.
    pub fn close(&mut self) {
        self.source = None;
        self.leftover = Bytes::new();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn take_leftover(&mut self, max_bytes: usize) -> Bytes {
        let n = max_bytes.min(self.leftover.len());
        self.leftover.split_to(n)
    }
}
